pub mod new_subscriber;
pub mod reward_tier;
pub mod subscriber;
pub mod subscriber_email;
