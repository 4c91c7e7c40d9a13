//! Listing filters applied to rows already fetched from the store.
//!
//! Every filter is a conjunction of exact-match and case-insensitive substring
//! checks. `"All"` (or an absent value) disables a select-style filter.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::db::models::{Hackathon, HackathonTeam, Startup, StudentProfile};

const ALL: &str = "All";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

fn selected(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ALL)
}

fn needle(q: &Option<String>) -> Option<String> {
    q.as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreelancerFilter {
    pub q: Option<String>,
    pub availability: Option<String>,
    pub min_rating: Option<f64>,
}

impl FreelancerFilter {
    pub fn matches(&self, f: &StudentProfile) -> bool {
        if let Some(q) = needle(&self.q) {
            let hit = contains(&f.name, &q)
                || contains(&f.tagline, &q)
                || f.skills.iter().any(|s| contains(s, &q));
            if !hit {
                return false;
            }
        }

        if let Some(availability) = selected(&self.availability) {
            if f.availability.as_str() != availability {
                return false;
            }
        }

        match self.min_rating {
            Some(min) if min > 0.0 => f.rating >= min,
            _ => true,
        }
    }

    pub fn apply(&self, freelancers: Vec<StudentProfile>) -> Vec<StudentProfile> {
        freelancers.into_iter().filter(|f| self.matches(f)).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartupFilter {
    pub q: Option<String>,
    pub industry: Option<String>,
    pub max_years: Option<i64>,
}

impl StartupFilter {
    pub fn matches(&self, s: &Startup) -> bool {
        if let Some(q) = needle(&self.q) {
            if !(contains(&s.name, &q) || contains(&s.tagline, &q) || contains(&s.industry, &q)) {
                return false;
            }
        }

        if let Some(industry) = selected(&self.industry) {
            if s.industry != industry {
                return false;
            }
        }

        match self.max_years {
            Some(max) => s.years_in_industry <= max,
            None => true,
        }
    }

    pub fn apply(&self, startups: Vec<Startup>) -> Vec<Startup> {
        startups.into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// `["All", ...]` followed by the distinct industries, in sorted order.
pub fn industries(startups: &[Startup]) -> Vec<String> {
    facet(startups.iter().map(|s| s.industry.as_str()))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HackathonFilter {
    pub q: Option<String>,
    pub mode: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl HackathonFilter {
    pub fn matches(&self, h: &Hackathon) -> bool {
        if let Some(q) = needle(&self.q) {
            let hit = contains(&h.title, &q)
                || contains(&h.organizer, &q)
                || h.tech_stack.iter().any(|t| contains(t, &q));
            if !hit {
                return false;
            }
        }

        match selected(&self.mode) {
            Some(mode) => h.mode.as_str() == mode,
            None => true,
        }
    }

    pub fn apply(&self, hackathons: Vec<Hackathon>) -> Vec<Hackathon> {
        let mut result: Vec<Hackathon> =
            hackathons.into_iter().filter(|h| self.matches(h)).collect();

        result.sort_by(|a, b| {
            let key_a = (date_year(&a.date), &a.created_at);
            let key_b = (date_year(&b.date), &b.created_at);
            match self.sort {
                SortOrder::Newest => key_b.cmp(&key_a),
                SortOrder::Oldest => key_a.cmp(&key_b),
            }
        });

        result
    }
}

/// Year of a free-text event date such as "Oct 26-28, 2024": the first number
/// after the last comma. Dates without one sort as 0.
pub fn date_year(date: &str) -> i32 {
    let Some((_, tail)) = date.rsplit_once(',') else {
        return 0;
    };

    tail.split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamFilter {
    pub q: Option<String>,
    pub role: Option<String>,
    pub hackathon_id: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl TeamFilter {
    pub fn matches(&self, t: &HackathonTeam) -> bool {
        if let Some(q) = needle(&self.q) {
            if !(contains(&t.name, &q) || contains(&t.description, &q)) {
                return false;
            }
        }

        if let Some(hackathon_id) = self.hackathon_id.as_deref() {
            if t.hackathon_id != hackathon_id {
                return false;
            }
        }

        match selected(&self.role) {
            Some(role) => t.looking_for.iter().any(|l| l.role == role),
            None => true,
        }
    }

    pub fn apply(&self, teams: Vec<HackathonTeam>) -> Vec<HackathonTeam> {
        let mut result: Vec<HackathonTeam> = teams.into_iter().filter(|t| self.matches(t)).collect();

        // RFC 3339 timestamps in UTC order lexicographically
        result.sort_by(|a, b| match self.sort {
            SortOrder::Newest => b.created_at.cmp(&a.created_at),
            SortOrder::Oldest => a.created_at.cmp(&b.created_at),
        });

        result
    }
}

/// `["All", ...]` followed by the distinct roles teams are looking for.
pub fn roles(teams: &[HackathonTeam]) -> Vec<String> {
    facet(
        teams
            .iter()
            .flat_map(|t| t.looking_for.iter().map(|l| l.role.as_str())),
    )
}

fn facet<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let distinct: BTreeSet<&str> = values.filter(|v| !v.is_empty()).collect();
    std::iter::once(ALL)
        .chain(distinct)
        .map(str::to_string)
        .collect()
}
