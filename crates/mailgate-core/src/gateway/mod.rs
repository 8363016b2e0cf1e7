//! Inbound mail gateway.
//!
//! Turns a raw message sent to an internal alias into everything the relay
//! needs:
//! - **Recipients**: real addresses pass through, aliases resolve through
//!   redirect records and user accounts (one level, never recursive)
//! - **Sender**: the `From` header is parsed and matched to one account,
//!   with role-priority tie breaking
//! - **Body**: a complete HTML document, escaping plain text
//! - **Attachments**: decoded, in message order
//!
//! # Example
//!
//! ```ignore
//! use mailgate_core::{GatewayConfig, MailGateway, parse_sender_email};
//!
//! let gateway = MailGateway::open(&GatewayConfig::default()).await?;
//! let recipients = gateway.resolve_recipients(["parent@gmail.com", "directors@site.learningu.org"]).await?;
//!
//! if let Some(address) = parse_sender_email(message.from())? {
//!     match gateway.lookup_sender(&address).await? {
//!         Some(user) => println!("relaying for {}", user.username),
//!         None => println!("rejecting unknown sender"),
//!     }
//! }
//! ```

mod body;
mod recipients;
mod sender;

pub use body::{Attachment, build_email_body, escape_html, extract_attachments};
pub use recipients::{addresses_from_header, filter_recipients};
pub use sender::{parse_sender_email, select_sender};

use crate::config::GatewayConfig;
use crate::redirect::RedirectRepository;
use crate::user::UserRepository;
use crate::Result;

/// Recipient and sender resolution backed by the redirect and user stores.
pub struct MailGateway {
    redirects: RedirectRepository,
    users: UserRepository,
    alias_domain: String,
    sender_domain: String,
}

impl MailGateway {
    /// Create a gateway over existing repositories.
    #[must_use]
    pub fn new(redirects: RedirectRepository, users: UserRepository, config: &GatewayConfig) -> Self {
        Self {
            redirects,
            users,
            alias_domain: config.alias_domain.clone(),
            sender_domain: config.sender_domain.clone(),
        }
    }

    /// Open both repositories on the configured database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(config: &GatewayConfig) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let path = path.to_string_lossy();
        let redirects = RedirectRepository::new(&path).await?;
        let users = UserRepository::new(&path).await?;
        Ok(Self::new(redirects, users, config))
    }

    /// Redirect store.
    #[must_use]
    pub const fn redirects(&self) -> &RedirectRepository {
        &self.redirects
    }

    /// User store.
    #[must_use]
    pub const fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Suffix that marks an address as an internal alias.
    #[must_use]
    pub fn alias_domain(&self) -> &str {
        &self.alias_domain
    }
}
