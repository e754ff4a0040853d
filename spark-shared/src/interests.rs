//! The closed vocabulary of interest tags a profile may carry.
//!
//! Tags are case-sensitive and compared verbatim. Anything outside this list is rejected
//! before it reaches the database or the interest index.

use std::collections::HashSet;
use std::sync::OnceLock;

pub const SYSTEM_INTERESTS: &[&str] = &[
    // arts & culture
    "Art", "Photography", "Fashion", "Content Creation", "TikTok", "Anime", "Creative Direction",
    // entertainment & media
    "Netflix", "Movies", "Reality TV", "YouTube", "Comedy Skits", "Podcasts",
    // food & drink
    "Foodie", "Brunch", "Cooking", "Street Food", "Cocktails", "Jollof", "Waakye",
    // music & audio
    "Afrobeats", "Amapiano", "Highlife", "Hip Hop", "R&B", "Live Music", "DJ Nights",
    // outdoors & travel
    "Travel", "Beach Hangouts", "Road Trips", "Aworshia", "Volta Trips",
    // sports & fitness
    "Gym", "Jogging", "Football", "Dance Workouts", "Yoga",
    // lifestyle & self-care
    "Self Care", "Skincare", "Meditation", "Fashion Forward", "Thrifting",
    // social & events
    "Detty December", "Tidal Rave", "AfroFuture", "Nightlife", "House Parties", "Sip & Paint", "Game Nights",
    // career
    "Tech & Coding", "Entrepreneurship", "Startups", "Finance",
];

fn vocabulary() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| SYSTEM_INTERESTS.iter().copied().collect())
}

pub fn is_valid_interest(tag: &str) -> bool {
    vocabulary().contains(tag)
}

/// Returns the tags that are not part of the vocabulary, in input order.
pub fn unknown_interests<'a, I>(tags: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(String::as_str)
        .filter(|t| !is_valid_interest(t))
        .collect()
}
