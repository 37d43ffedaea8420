// service/contact_guard.rs
//
// Heuristic check for contact details shared in chat. It only annotates
// messages; sending is never blocked.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeakCategory {
    PhoneNumber,
    MessagingApp,
    Handle,
    Domain,
    SocialNetwork,
}

impl LeakCategory {
    pub fn to_str(&self) -> &'static str {
        match self {
            LeakCategory::PhoneNumber => "phone_number",
            LeakCategory::MessagingApp => "messaging_app",
            LeakCategory::Handle => "handle",
            LeakCategory::Domain => "domain",
            LeakCategory::SocialNetwork => "social_network",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct LeakVerdict {
    pub suspicious: bool,
    pub categories: Vec<LeakCategory>,
}

impl LeakVerdict {
    /// First matched category, used for the warning banner.
    pub fn category(&self) -> Option<LeakCategory> {
        self.categories.first().copied()
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.to_str().to_string()).collect()
    }
}

static LONG_DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{10,}").expect("static pattern"));

static GROUPED_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}[\s.\-]?[0-9]{4}").expect("static pattern"));

const MESSAGING_APPS: [&str; 2] = ["whatsapp", "wpp"];
const SOCIAL_NETWORKS: [&str; 2] = ["instagram", "facebook"];

pub fn inspect(text: &str) -> LeakVerdict {
    let lowered = text.to_lowercase();
    let mut categories = Vec::new();

    if LONG_DIGIT_RUN.is_match(&lowered) || GROUPED_DIGITS.is_match(&lowered) {
        categories.push(LeakCategory::PhoneNumber);
    }
    if MESSAGING_APPS.iter().any(|needle| lowered.contains(needle)) {
        categories.push(LeakCategory::MessagingApp);
    }
    if lowered.contains('@') {
        categories.push(LeakCategory::Handle);
    }
    if lowered.contains(".com") {
        categories.push(LeakCategory::Domain);
    }
    if SOCIAL_NETWORKS.iter().any(|needle| lowered.contains(needle)) {
        categories.push(LeakCategory::SocialNetwork);
    }

    LeakVerdict {
        suspicious: !categories.is_empty(),
        categories,
    }
}
