//! Recipient filtering and alias resolution.

use tracing::{debug, warn};

use super::MailGateway;
use super::sender::extract_address;
use crate::Result;

/// Split recipients into `(real_recipients, aliases)`.
///
/// Addresses ending in `domain` are aliases; any other address containing
/// `@` is a real recipient. Everything else is dropped with a warning.
/// Both outputs keep input order.
pub fn filter_recipients<I, S>(recipients: I, domain: &str) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut real_recipients = Vec::new();
    let mut aliases = Vec::new();

    for recipient in recipients {
        let recipient = recipient.as_ref();
        if recipient.ends_with(domain) {
            aliases.push(recipient.to_string());
        } else if recipient.contains('@') {
            real_recipients.push(recipient.to_string());
        } else {
            warn!("Email address without `@` symbol: `{recipient}`");
        }
    }

    (real_recipients, aliases)
}

/// Addresses listed in a `To`/`Cc` style header value.
///
/// Entries are split on commas; `Name <addr>` entries yield `addr`.
#[must_use]
pub fn addresses_from_header(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(extract_address)
        .filter(|address| !address.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

impl MailGateway {
    /// Resolve alias addresses to external addresses.
    ///
    /// Each alias's local-part is matched, ignoring case, against redirect
    /// keys and usernames. Redirect destinations come first, then account
    /// emails. Results still ending in the alias domain are dropped, so at
    /// most one level of indirection is followed.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn resolve_aliases(&self, aliases: &[String]) -> Result<Vec<String>> {
        if aliases.is_empty() {
            return Ok(Vec::new());
        }

        let local_parts: Vec<String> = aliases
            .iter()
            .map(|alias| local_part(alias).to_lowercase())
            .collect();

        let redirects = self.redirects.find_by_originals(&local_parts).await?;
        let users = self.users.find_by_usernames(&local_parts).await?;

        let redirect_addresses = redirects.iter().flat_map(|r| r.destinations());
        let user_addresses = users.iter().map(|u| u.email.as_str());

        let resolved: Vec<String> = redirect_addresses
            .chain(user_addresses)
            .map(str::trim)
            .filter(|address| !address.is_empty() && !address.ends_with(&self.alias_domain))
            .map(ToString::to_string)
            .collect();

        debug!(
            "Resolved {} alias(es) to {} address(es)",
            aliases.len(),
            resolved.len()
        );

        Ok(resolved)
    }

    /// Full recipient pipeline: real recipients followed by resolved aliases.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn resolve_recipients<I, S>(&self, recipients: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (mut real_recipients, aliases) = filter_recipients(recipients, &self.alias_domain);
        real_recipients.extend(self.resolve_aliases(&aliases).await?);
        Ok(real_recipients)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::redirect::RedirectRepository;
    use crate::user::UserRepository;

    const DOMAIN: &str = ".learningu.org";

    async fn gateway() -> MailGateway {
        MailGateway::new(
            RedirectRepository::in_memory().await.unwrap(),
            UserRepository::in_memory().await.unwrap(),
            &GatewayConfig::default(),
        )
    }

    fn aliases(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    mod filter {
        use super::*;

        #[test]
        fn all_real_addresses() {
            let (real, aliases) = filter_recipients(["alice@gmail.com", "bob@yahoo.com"], DOMAIN);
            assert_eq!(real, vec!["alice@gmail.com", "bob@yahoo.com"]);
            assert!(aliases.is_empty());
        }

        #[test]
        fn all_aliases() {
            let (real, aliases) = filter_recipients(
                ["user1@site.learningu.org", "user2@other.learningu.org"],
                DOMAIN,
            );
            assert!(real.is_empty());
            assert_eq!(
                aliases,
                vec!["user1@site.learningu.org", "user2@other.learningu.org"]
            );
        }

        #[test]
        fn mixed_keeps_order() {
            let (real, aliases) = filter_recipients(
                [
                    "real@gmail.com",
                    "alias@site.learningu.org",
                    "another@yahoo.com",
                    "admin@test.learningu.org",
                ],
                DOMAIN,
            );
            assert_eq!(real, vec!["real@gmail.com", "another@yahoo.com"]);
            assert_eq!(
                aliases,
                vec!["alias@site.learningu.org", "admin@test.learningu.org"]
            );
        }

        #[test]
        fn empty_input() {
            let (real, aliases) = filter_recipients(Vec::<String>::new(), DOMAIN);
            assert!(real.is_empty());
            assert!(aliases.is_empty());
        }

        #[test]
        fn address_without_at_is_dropped() {
            let (real, aliases) = filter_recipients(["malformed-address", "valid@gmail.com"], DOMAIN);
            assert_eq!(real, vec!["valid@gmail.com"]);
            assert!(aliases.is_empty());
        }

        #[test]
        fn bare_platform_domain_is_not_an_alias() {
            // no dot before the domain, so the suffix does not match
            let (real, aliases) = filter_recipients(["user@learningu.org"], DOMAIN);
            assert_eq!(real, vec!["user@learningu.org"]);
            assert!(aliases.is_empty());
        }

        #[test]
        fn custom_domain() {
            let (real, aliases) =
                filter_recipients(["user@custom.org", "other@gmail.com"], "custom.org");
            assert_eq!(real, vec!["other@gmail.com"]);
            assert_eq!(aliases, vec!["user@custom.org"]);
        }

        proptest! {
            /// Every input lands in exactly one of real, alias, or dropped,
            /// and addresses without `@` never survive unless they are aliases.
            #[test]
            fn partitions_every_address(
                input in proptest::collection::vec(
                    prop_oneof![
                        "[a-z]{1,8}@[a-z]{1,8}\\.com",
                        "[a-z]{1,8}@[a-z]{1,8}\\.learningu\\.org",
                        "[a-z]{1,12}",
                    ],
                    0..20,
                )
            ) {
                let (real, aliases) = filter_recipients(&input, DOMAIN);
                let dropped = input
                    .iter()
                    .filter(|a| !a.ends_with(DOMAIN) && !a.contains('@'))
                    .count();

                prop_assert_eq!(real.len() + aliases.len() + dropped, input.len());
                prop_assert!(real.iter().all(|a| a.contains('@') && !a.ends_with(DOMAIN)));
                prop_assert!(aliases.iter().all(|a| a.ends_with(DOMAIN)));
            }
        }
    }

    mod header {
        use super::*;

        #[test]
        fn display_names_and_bare_addresses() {
            let addresses =
                addresses_from_header("Parent <parent@gmail.com>, directors@site.learningu.org");
            assert_eq!(
                addresses,
                vec!["parent@gmail.com", "directors@site.learningu.org"]
            );
        }

        #[test]
        fn blank_entries_skipped() {
            assert_eq!(addresses_from_header(" , a@b.com, "), vec!["a@b.com"]);
            assert!(addresses_from_header("").is_empty());
        }
    }

    mod resolve {
        use super::*;

        #[tokio::test]
        async fn via_redirect() {
            let gateway = gateway().await;
            gateway
                .redirects()
                .create("directors", Some("alice@gmail.com"))
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&["directors@site.learningu.org"]))
                .await
                .unwrap();
            assert_eq!(result, vec!["alice@gmail.com"]);
        }

        #[tokio::test]
        async fn via_redirect_case_insensitive() {
            let gateway = gateway().await;
            gateway
                .redirects()
                .create("Directors", Some("alice@gmail.com"))
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&["DIRECTORS@site.learningu.org"]))
                .await
                .unwrap();
            assert_eq!(result, vec!["alice@gmail.com"]);
        }

        #[tokio::test]
        async fn non_ascii_local_parts_fold_case() {
            let gateway = gateway().await;
            gateway
                .users()
                .create("Émile", "emile@gmail.com", Utc::now())
                .await
                .unwrap();
            gateway
                .redirects()
                .create("Équipe", Some("team@gmail.com"))
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&[
                    "Émile@site.learningu.org",
                    "équipe@site.learningu.org",
                ]))
                .await
                .unwrap();
            assert_eq!(result, vec!["team@gmail.com", "emile@gmail.com"]);
        }

        #[tokio::test]
        async fn comma_separated_redirect_expands() {
            let gateway = gateway().await;
            gateway
                .redirects()
                .create("team", Some("alice@gmail.com, bob@yahoo.com"))
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&["team@site.learningu.org"]))
                .await
                .unwrap();
            assert_eq!(result, vec!["alice@gmail.com", "bob@yahoo.com"]);
        }

        #[tokio::test]
        async fn via_user_account_case_insensitive() {
            let gateway = gateway().await;
            gateway
                .users()
                .create("JSmith", "jsmith@gmail.com", Utc::now())
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&["jsmith@site.learningu.org"]))
                .await
                .unwrap();
            assert_eq!(result, vec!["jsmith@gmail.com"]);
        }

        #[tokio::test]
        async fn internal_destinations_filtered() {
            let gateway = gateway().await;
            gateway
                .redirects()
                .create("alias", Some("other@another.learningu.org"))
                .await
                .unwrap();
            gateway
                .users()
                .create("testuser", "testuser@site.learningu.org", Utc::now())
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&[
                    "alias@site.learningu.org",
                    "testuser@site.learningu.org",
                ]))
                .await
                .unwrap();
            assert!(result.is_empty());
        }

        #[tokio::test]
        async fn unresolvable_redirects_excluded() {
            let gateway = gateway().await;
            gateway.redirects().create("empty", None).await.unwrap();
            gateway.redirects().create("blank", Some("")).await.unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&[
                    "empty@site.learningu.org",
                    "blank@site.learningu.org",
                ]))
                .await
                .unwrap();
            assert!(result.is_empty());
        }

        #[tokio::test]
        async fn redirect_and_user_both_included_redirect_first() {
            let gateway = gateway().await;
            gateway
                .users()
                .create("shared", "user@gmail.com", Utc::now())
                .await
                .unwrap();
            gateway
                .redirects()
                .create("shared", Some("redirect@gmail.com"))
                .await
                .unwrap();

            let result = gateway
                .resolve_aliases(&aliases(&["shared@site.learningu.org"]))
                .await
                .unwrap();
            assert_eq!(result, vec!["redirect@gmail.com", "user@gmail.com"]);
        }

        #[tokio::test]
        async fn no_match_and_empty_input() {
            let gateway = gateway().await;
            assert!(
                gateway
                    .resolve_aliases(&aliases(&["nonexistent@site.learningu.org"]))
                    .await
                    .unwrap()
                    .is_empty()
            );
            assert!(gateway.resolve_aliases(&[]).await.unwrap().is_empty());
        }
    }

    mod pipeline {
        use super::*;

        #[tokio::test]
        async fn mixed_real_and_aliases() {
            let gateway = gateway().await;
            gateway
                .users()
                .create("teacher1", "teacher@school.edu", Utc::now())
                .await
                .unwrap();

            let result = gateway
                .resolve_recipients(["parent@gmail.com", "teacher1@site.learningu.org"])
                .await
                .unwrap();
            assert_eq!(result, vec!["parent@gmail.com", "teacher@school.edu"]);
        }

        #[tokio::test]
        async fn empty_recipients() {
            let gateway = gateway().await;
            let result = gateway
                .resolve_recipients(Vec::<String>::new())
                .await
                .unwrap();
            assert!(result.is_empty());
        }

        #[tokio::test]
        async fn unresolvable_aliases_yield_nothing() {
            let gateway = gateway().await;
            let result = gateway
                .resolve_recipients(["ghost@site.learningu.org", "phantom@other.learningu.org"])
                .await
                .unwrap();
            assert!(result.is_empty());
        }

        #[tokio::test]
        async fn real_addresses_pass_through_unchanged() {
            let gateway = gateway().await;
            let recipients = ["a@gmail.com", "b@yahoo.com", "c@school.edu"];
            let result = gateway.resolve_recipients(recipients).await.unwrap();
            assert_eq!(result, recipients);
        }

        #[tokio::test]
        async fn never_returns_internal_addresses() {
            let gateway = gateway().await;
            gateway
                .redirects()
                .create("loop", Some("loop@site.learningu.org,out@example.com"))
                .await
                .unwrap();
            gateway
                .users()
                .create("loop", "loop@other.learningu.org", Utc::now())
                .await
                .unwrap();

            let result = gateway
                .resolve_recipients(["loop@site.learningu.org"])
                .await
                .unwrap();
            assert_eq!(result, vec!["out@example.com"]);
            assert!(result.iter().all(|a| !a.ends_with(DOMAIN)));
        }
    }
}
