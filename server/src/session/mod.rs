pub mod claims;
pub mod clock;
pub mod cookie;
pub mod credentials;
pub mod machine;
pub mod users;

pub use claims::{ClaimsEngine, TokenError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cookie::SessionCookie;
pub use credentials::{CredentialSource, ExtractError};
pub use machine::{AuthError, AuthInput, AuthState, Decision, RequestAuthenticator};
pub use users::{CredentialError, User, UserDirectory};
