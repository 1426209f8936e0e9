pub mod pkce;
pub mod provider;
pub mod service;
pub mod session;
pub mod token;

pub use provider::{HttpOidcProvider, OidcProvider, ProviderMetadata, TokenBundle};
pub use service::{AuthService, ClientInfo};
pub use session::{Session, SessionId, SessionStore};
pub use token::{Audience, IdTokenClaims, TokenVerifier};
