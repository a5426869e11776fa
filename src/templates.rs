use chrono::{Datelike, Utc};
use uuid::Uuid;

use crate::domain::reward_tier::RewardTier;

/// Links shared by every transactional email, plus the footer year. The
/// unsubscribe link embeds the recipient's own token.
pub struct EmailLinks {
    pub members_url: String,
    pub indications_url: String,
    pub unsubscribe_url: String,
    pub current_year: i32,
}

impl EmailLinks {
    pub fn for_subscriber(base_url: &str, token: &Uuid) -> EmailLinks {
        EmailLinks {
            members_url: format!("{}/newsletter/members", base_url),
            indications_url: format!("{}/newsletter/referrals", base_url),
            unsubscribe_url: format!("{}/newsletter/unsubscribe?token={}", base_url, token),
            current_year: Utc::now().year(),
        }
    }
}

pub struct ConfirmationEmail {
    pub confirmation_url: String,
    pub links: EmailLinks,
}

pub struct RewardEmail {
    pub reward: RewardTier,
    pub links: EmailLinks,
}

pub struct ReferralThankYouEmail {
    pub indications: i32,
    pub links: EmailLinks,
}

/// One variant per transactional email the service sends. Each variant owns
/// the full set of fields its HTML needs, so a template can never be
/// rendered with missing placeholders.
pub enum EmailTemplate {
    Confirmation(ConfirmationEmail),
    Reward(RewardEmail),
    ReferralThankYou(ReferralThankYouEmail),
}

impl EmailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::Confirmation(_) => "You are one click away from the newsletter!",
            EmailTemplate::Reward(_) => "Here is your reward for referring the newsletter",
            EmailTemplate::ReferralThankYou(_) => "Thank you for referring the newsletter",
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EmailTemplate::Confirmation(_) => "confirmation",
            EmailTemplate::Reward(_) => "reward",
            EmailTemplate::ReferralThankYou(_) => "referral thank-you",
        }
    }

    pub fn render(&self) -> String {
        match self {
            EmailTemplate::Confirmation(email) => format!(
                r#"
                    <div>
                        <h1>Welcome to the newsletter!</h1>
                        <p>Click <a href="{}">here</a> to confirm your email and start receiving every edition.</p>
                        {}
                    </div>
                "#,
                email.confirmation_url,
                footer(&email.links)
            ),
            EmailTemplate::Reward(email) => format!(
                r#"
                    <div>
                        <h1>You unlocked a reward!</h1>
                        <p>You referred the newsletter {} times, which unlocks <strong>{}</strong>.</p>
                        <p>Claim it <a href="{}">here</a>.</p>
                        {}
                    </div>
                "#,
                email.reward.indications,
                email.reward.name,
                email.reward.url,
                footer(&email.links)
            ),
            EmailTemplate::ReferralThankYou(email) => format!(
                r#"
                    <div>
                        <h1>Thank you for spreading the word!</h1>
                        <p>One more referral confirmed their email. You are at {} referrals now.</p>
                        <p>Check the <a href="{}">rewards page</a> to see what the next tier unlocks.</p>
                        {}
                    </div>
                "#,
                email.indications,
                email.links.indications_url,
                footer(&email.links)
            ),
        }
    }
}

fn footer(links: &EmailLinks) -> String {
    format!(
        r#"
            <hr />
            <p>
                <a href="{}">Members</a> | <a href="{}">Referrals</a> | <a href="{}">Unsubscribe</a>
            </p>
            <p>© {} newsletter</p>
        "#,
        links.members_url, links.indications_url, links.unsubscribe_url, links.current_year
    )
}
