mod health_check;
mod issues;
mod rewards;
mod subscribers;
mod subscribers_confirm;
mod subscribers_delete;
mod subscribers_member;
mod subscribers_referral_link;

pub use health_check::*;
pub use issues::*;
pub use rewards::*;
pub use subscribers::*;
pub use subscribers_confirm::*;
pub use subscribers_delete::*;
pub use subscribers_member::*;
pub use subscribers_referral_link::*;
