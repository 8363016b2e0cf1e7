//! Sender parsing and account lookup.

use tracing::{debug, warn};

use super::MailGateway;
use crate::user::{SENDER_ROLE_PRIORITY, UserAccount};
use crate::{Error, Result};

/// Parse the sender address out of a `From` header value.
///
/// Returns `Ok(None)` for a missing or blank header. `Name <addr>` yields
/// `addr`.
///
/// # Errors
///
/// Returns [`Error::MalformedSender`] if the header holds more than one
/// comma-separated entry. A quoted display name containing a comma also
/// fails this way.
pub fn parse_sender_email(from: Option<&str>) -> Result<Option<String>> {
    let Some(from) = from.filter(|f| !f.trim().is_empty()) else {
        return Ok(None);
    };

    if from.contains(',') {
        return Err(Error::MalformedSender(from.to_string()));
    }

    Ok(Some(extract_address(from).to_string()))
}

/// Address part of a single header entry.
///
/// With both `<` and `>` present, returns the text after the first `<` up
/// to the next `>`; otherwise the trimmed entry.
pub(super) fn extract_address(entry: &str) -> &str {
    let entry = entry.trim();
    if !(entry.contains('<') && entry.contains('>')) {
        return entry;
    }

    entry
        .split_once('<')
        .map_or(entry, |(_, rest)| rest.split('>').next().unwrap_or(rest))
}

/// Pick one account among candidates ordered oldest first.
///
/// The first role tier with a member wins, oldest member first. If no
/// candidate holds a ranked role the oldest candidate is returned.
#[must_use]
pub fn select_sender(candidates: Vec<UserAccount>) -> Option<UserAccount> {
    if candidates.len() <= 1 {
        return candidates.into_iter().next();
    }

    for role in &SENDER_ROLE_PRIORITY {
        if let Some(index) = candidates.iter().position(|user| user.has_role(role)) {
            debug!("Selected sender from {} candidates by role {role}", candidates.len());
            return candidates.into_iter().nth(index);
        }
    }

    debug!(
        "No ranked role among {} candidates, using the oldest account",
        candidates.len()
    );
    candidates.into_iter().next()
}

impl MailGateway {
    /// Find the account that sent a message.
    ///
    /// Addresses on the sender domain match by username (the local-part),
    /// all others by email. Both comparisons ignore case.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn lookup_sender(&self, address: &str) -> Result<Option<UserAccount>> {
        let candidates = if address.ends_with(&self.sender_domain) {
            let username = address.split('@').next().unwrap_or(address);
            self.users.find_by_username(username).await?
        } else {
            self.users.find_by_email(address).await?
        };

        let sender = select_sender(candidates);
        if sender.is_none() {
            warn!("Couldn't find user `{address}`");
        }

        Ok(sender)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::redirect::RedirectRepository;
    use crate::user::{Role, UserRepository};

    async fn gateway() -> MailGateway {
        let config = GatewayConfig {
            sender_domain: "test.learningu.org".to_string(),
            ..GatewayConfig::default()
        };
        MailGateway::new(
            RedirectRepository::in_memory().await.unwrap(),
            UserRepository::in_memory().await.unwrap(),
            &config,
        )
    }

    async fn user_with_roles(
        gateway: &MailGateway,
        username: &str,
        email: &str,
        date_joined: DateTime<Utc>,
        roles: &[Role],
    ) -> UserAccount {
        let user = gateway
            .users()
            .create(username, email, date_joined)
            .await
            .unwrap();
        for role in roles {
            gateway.users().add_role(user.id, role).await.unwrap();
        }
        user
    }

    mod parse {
        use super::*;

        #[test]
        fn missing_or_blank_is_no_sender() {
            assert_eq!(parse_sender_email(None).unwrap(), None);
            assert_eq!(parse_sender_email(Some("")).unwrap(), None);
            assert_eq!(parse_sender_email(Some("   ")).unwrap(), None);
        }

        #[test]
        fn plain_address() {
            assert_eq!(
                parse_sender_email(Some("sender@gmail.com")).unwrap(),
                Some("sender@gmail.com".to_string())
            );
        }

        #[test]
        fn display_name() {
            assert_eq!(
                parse_sender_email(Some("John Doe <john@gmail.com>")).unwrap(),
                Some("john@gmail.com".to_string())
            );
        }

        #[test]
        fn surrounding_whitespace_trimmed() {
            assert_eq!(
                parse_sender_email(Some("  sender@gmail.com  ")).unwrap(),
                Some("sender@gmail.com".to_string())
            );
        }

        #[test]
        fn multiple_senders_rejected() {
            let err = parse_sender_email(Some("a@gmail.com, b@gmail.com")).unwrap_err();
            assert!(matches!(err, Error::MalformedSender(_)));
        }

        #[test]
        fn trailing_comma_rejected() {
            assert!(parse_sender_email(Some("a@gmail.com,")).is_err());
        }

        #[test]
        fn quoted_comma_display_name_rejected() {
            assert!(parse_sender_email(Some("\"Doe, John\" <john@gmail.com>")).is_err());
        }

        #[test]
        fn only_one_bracket_kept_verbatim() {
            assert_eq!(
                parse_sender_email(Some("john@gmail.com>")).unwrap(),
                Some("john@gmail.com>".to_string())
            );
        }

        proptest! {
            #[test]
            fn never_panics(input in "\\PC*") {
                let _ = parse_sender_email(Some(&input));
            }

            #[test]
            fn bracketed_address_extracted(
                name in "[A-Za-z ]{0,16}",
                address in "[a-z]{1,8}@[a-z]{1,8}\\.com",
            ) {
                let header = format!("{name} <{address}>");
                prop_assert_eq!(parse_sender_email(Some(&header)).unwrap(), Some(address));
            }
        }
    }

    mod select {
        use super::*;

        fn account(id: i64, roles: Vec<Role>) -> UserAccount {
            UserAccount {
                id,
                username: format!("user{id}"),
                email: "shared@gmail.com".to_string(),
                roles,
                date_joined: Utc::now(),
            }
        }

        #[test]
        fn empty_and_single() {
            assert!(select_sender(Vec::new()).is_none());
            let only = account(1, vec![]);
            assert_eq!(select_sender(vec![only.clone()]), Some(only));
        }

        #[test]
        fn administrator_beats_everyone() {
            let candidates = vec![
                account(1, vec![Role::Educator]),
                account(2, vec![Role::Student]),
                account(3, vec![Role::Teacher]),
                account(4, vec![Role::Administrator]),
            ];
            assert_eq!(select_sender(candidates).unwrap().id, 4);
        }

        #[test]
        fn oldest_within_tier() {
            let candidates = vec![
                account(1, vec![Role::Student]),
                account(2, vec![Role::Volunteer]),
                account(3, vec![Role::Volunteer]),
            ];
            assert_eq!(select_sender(candidates).unwrap().id, 2);
        }

        #[test]
        fn unranked_roles_fall_back_to_oldest() {
            let candidates = vec![
                account(1, vec![Role::Other("Guest".to_string())]),
                account(2, vec![]),
            ];
            assert_eq!(select_sender(candidates).unwrap().id, 1);
        }
    }

    mod lookup {
        use super::*;

        #[tokio::test]
        async fn by_email_single_match() {
            let gateway = gateway().await;
            let user = user_with_roles(&gateway, "jsmith", "jsmith@gmail.com", Utc::now(), &[]).await;

            let found = gateway.lookup_sender("jsmith@gmail.com").await.unwrap();
            assert_eq!(found.unwrap().id, user.id);
        }

        #[tokio::test]
        async fn by_email_case_insensitive() {
            let gateway = gateway().await;
            let user = user_with_roles(&gateway, "jsmith", "JSmith@Gmail.com", Utc::now(), &[]).await;

            let found = gateway.lookup_sender("jsmith@gmail.com").await.unwrap();
            assert_eq!(found.unwrap().id, user.id);
        }

        #[tokio::test]
        async fn no_match() {
            let gateway = gateway().await;
            assert!(gateway.lookup_sender("nobody@gmail.com").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn sender_domain_matches_username() {
            let gateway = gateway().await;
            let user =
                user_with_roles(&gateway, "director", "director@gmail.com", Utc::now(), &[]).await;

            let found = gateway
                .lookup_sender("DIRECTOR@test.learningu.org")
                .await
                .unwrap();
            assert_eq!(found.unwrap().id, user.id);
        }

        #[tokio::test]
        async fn teacher_beats_student_regardless_of_age() {
            let gateway = gateway().await;
            let now = Utc::now();
            user_with_roles(
                &gateway,
                "student",
                "family@gmail.com",
                now - Duration::days(365),
                &[Role::Student],
            )
            .await;
            let teacher = user_with_roles(
                &gateway,
                "teacher",
                "family@gmail.com",
                now,
                &[Role::Teacher],
            )
            .await;

            let found = gateway.lookup_sender("family@gmail.com").await.unwrap();
            assert_eq!(found.unwrap().id, teacher.id);
        }

        #[tokio::test]
        async fn group_names_match_exactly() {
            let gateway = gateway().await;
            let now = Utc::now();
            user_with_roles(
                &gateway,
                "lowercase",
                "family@gmail.com",
                now - Duration::days(365),
                &[Role::Other("teacher".to_string())],
            )
            .await;
            let student = user_with_roles(
                &gateway,
                "student",
                "family@gmail.com",
                now,
                &[Role::Student],
            )
            .await;

            let found = gateway.lookup_sender("family@gmail.com").await.unwrap();
            assert_eq!(found.unwrap().id, student.id);
        }

        #[tokio::test]
        async fn no_roles_returns_oldest() {
            let gateway = gateway().await;
            let now = Utc::now();
            user_with_roles(&gateway, "newer", "shared@gmail.com", now, &[]).await;
            let older = user_with_roles(
                &gateway,
                "older",
                "shared@gmail.com",
                now - Duration::days(10),
                &[],
            )
            .await;

            let found = gateway.lookup_sender("shared@gmail.com").await.unwrap();
            assert_eq!(found.unwrap().id, older.id);
        }

        #[tokio::test]
        async fn oldest_in_winning_tier() {
            let gateway = gateway().await;
            let now = Utc::now();
            user_with_roles(
                &gateway,
                "admin_new",
                "staff@gmail.com",
                now,
                &[Role::Administrator],
            )
            .await;
            let admin_old = user_with_roles(
                &gateway,
                "admin_old",
                "staff@gmail.com",
                now - Duration::days(5),
                &[Role::Administrator, Role::Teacher],
            )
            .await;
            user_with_roles(
                &gateway,
                "volunteer",
                "staff@gmail.com",
                now - Duration::days(50),
                &[Role::Volunteer],
            )
            .await;

            let found = gateway.lookup_sender("staff@gmail.com").await.unwrap();
            assert_eq!(found.unwrap().id, admin_old.id);
        }
    }
}
