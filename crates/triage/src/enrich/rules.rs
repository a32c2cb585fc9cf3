//! Diagnosis rule table.
//!
//! Rules are evaluated in order against the lowercased finding text; the
//! first rule whose domain and matcher both fit produces the diagnosis.

use serde_json::Value;

use crate::agents::Domain;
use crate::model::{CanonicalReport, FixSuggestion, RawAlert};
use crate::report::{display_value, number};

use Matcher::{AllOf, AnyOf, Contains};

/// Substring predicate over a lowercased finding.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    Contains(&'static str),
    AnyOf(&'static [Matcher]),
    AllOf(&'static [Matcher]),
}

impl Matcher {
    #[must_use]
    pub fn matches(&self, finding: &str) -> bool {
        match self {
            Self::Contains(needle) => finding.contains(needle),
            Self::AnyOf(matchers) => matchers.iter().any(|m| m.matches(finding)),
            Self::AllOf(matchers) => matchers.iter().all(|m| m.matches(finding)),
        }
    }
}

/// Inputs available to a rule template.
#[derive(Debug)]
pub struct RuleContext<'a> {
    pub alert: &'a RawAlert,
    pub agent_id: &'a str,
    pub report: &'a CanonicalReport,
    pub impact_monthly: f64,
}

/// What a rule contributes to an enriched alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub why: String,
    pub evidence: Vec<String>,
    pub fixes: Vec<FixSuggestion>,
}

/// One entry of the rule table.
pub struct Rule {
    pub domain: Domain,
    pub name: &'static str,
    pub matcher: Matcher,
    pub diagnose: fn(&RuleContext<'_>) -> Diagnosis,
}

/// Every rule, in priority order.
pub static RULES: &[Rule] = &[
    // Ad spend
    Rule {
        domain: Domain::AdSpend,
        name: "zero_conversions",
        matcher: AnyOf(&[Contains("zero conversions"), Contains("0 conversions")]),
        diagnose: ad_zero_conversions,
    },
    Rule {
        domain: Domain::AdSpend,
        name: "high_cpa",
        matcher: AllOf(&[
            Contains("cpa"),
            AnyOf(&[Contains("high"), Contains("2."), Contains("3.")]),
        ]),
        diagnose: ad_high_cpa,
    },
    Rule {
        domain: Domain::AdSpend,
        name: "conversions_collapsed",
        matcher: AnyOf(&[
            Contains("collapsed"),
            AllOf(&[Contains("dropped"), Contains("conversion")]),
        ]),
        diagnose: ad_conversions_collapsed,
    },
    Rule {
        domain: Domain::AdSpend,
        name: "performing_well",
        matcher: AnyOf(&[Contains("excellent"), Contains("good"), Contains("performing")]),
        diagnose: ad_performing_well,
    },
    // Local search
    Rule {
        domain: Domain::LocalSearch,
        name: "deindexed_pages",
        matcher: Contains("deindex"),
        diagnose: local_deindexed,
    },
    Rule {
        domain: Domain::LocalSearch,
        name: "zero_results",
        matcher: AllOf(&[Contains("zero"), Contains("results")]),
        diagnose: local_zero_results,
    },
    Rule {
        domain: Domain::LocalSearch,
        name: "page_not_indexed",
        matcher: AnyOf(&[Contains("not appearing"), Contains("not indexed")]),
        diagnose: local_not_indexed,
    },
    // Search intel
    Rule {
        domain: Domain::SearchIntel,
        name: "organic_drop",
        matcher: AnyOf(&[Contains("dropped"), Contains("drop")]),
        diagnose: search_organic_drop,
    },
    Rule {
        domain: Domain::SearchIntel,
        name: "weak_rankings",
        matcher: AnyOf(&[Contains("ranking poorly"), Contains("low ctr")]),
        diagnose: search_weak_rankings,
    },
    // Analytics
    Rule {
        domain: Domain::Analytics,
        name: "sessions_without_conversions",
        matcher: AllOf(&[Contains("zero conversions"), Contains("sessions")]),
        diagnose: analytics_no_conversions,
    },
    Rule {
        domain: Domain::Analytics,
        name: "high_bounce",
        matcher: Contains("bounce"),
        diagnose: analytics_bounce,
    },
];

/// First rule for `domain` matching the lowercased finding.
#[must_use]
pub fn find_rule(domain: Domain, finding_lower: &str) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| rule.domain == domain && rule.matcher.matches(finding_lower))
}

/// Dollar amount without trailing zeros for whole figures.
#[must_use]
pub fn dollars(amount: f64) -> String {
    if amount.fract().abs() < f64::EPSILON {
        format!("${amount:.0}")
    } else {
        format!("${amount:.2}")
    }
}

fn finding_only(ctx: &RuleContext<'_>) -> Vec<String> {
    vec![ctx.alert.finding.clone()]
}

/// Campaigns with spend but no conversions, the alert's school first.
fn wasted_campaigns(ctx: &RuleContext<'_>) -> Vec<String> {
    let Some(Value::Object(breakdown)) = ctx.report.campaign_breakdown() else {
        return Vec::new();
    };

    let own = breakdown.get(&ctx.alert.school).into_iter();
    let others = breakdown
        .iter()
        .filter(|(school, _)| **school != ctx.alert.school)
        .map(|(_, campaigns)| campaigns);

    own.chain(others)
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_object)
        .filter(|c| {
            c.get("conversions")
                .and_then(Value::as_f64)
                .is_some_and(|conversions| conversions.abs() < f64::EPSILON)
                && number(c, "spend").unwrap_or(0.0) > 50.0
        })
        .filter_map(|c| c.get("name").map(display_value))
        .filter(|name| !name.is_empty())
        .collect()
}

fn school_section<'a>(
    ctx: &'a RuleContext<'_>,
    section: &str,
) -> Option<&'a serde_json::Map<String, Value>> {
    ctx.report
        .section(section)?
        .get(&ctx.alert.school)?
        .as_object()
}

fn ad_zero_conversions(ctx: &RuleContext<'_>) -> Diagnosis {
    let wasted = wasted_campaigns(ctx);
    let campaign = wasted.first().cloned();

    let mut evidence = vec![format!(
        "{} spent in the last 7 days with 0 conversions",
        dollars(ctx.alert.impact_dollars)
    )];
    evidence.push(campaign.as_ref().map_or_else(
        || "Multiple campaigns affected".to_string(),
        |name| format!("Campaign: {name}"),
    ));
    if wasted.len() > 1 {
        evidence.push(format!(
            "{} other campaigns also spent over $50 without a conversion",
            wasted.len() - 1
        ));
    }

    Diagnosis {
        why: "This campaign has been spending money for a full week without generating a single \
              tour booking. Either the targeting is too broad, the landing page isn't converting, \
              or conversion tracking is broken."
            .to_string(),
        evidence,
        fixes: vec![
            FixSuggestion::new(
                "Pause the campaign immediately to stop wasting budget",
                "pause_campaign",
                format!("Save ~{}/month", dollars(ctx.impact_monthly)),
                "annunci",
            )
            .with_campaign(campaign.unwrap_or_else(|| ctx.alert.finding.clone())),
            FixSuggestion::new(
                "Verify conversion tracking is working with Bussola",
                "verify_tracking",
                "Ensure data accuracy",
                "bussola",
            ),
        ],
    }
}

fn ad_high_cpa(ctx: &RuleContext<'_>) -> Diagnosis {
    let mut evidence = finding_only(ctx);
    if let Some(cpa) = school_section(ctx, "spend").and_then(|s| number(s, "cpa")) {
        evidence.push(format!("Current CPA for {}: {}", ctx.alert.school, dollars(cpa)));
    }

    Diagnosis {
        why: "The cost per acquisition is well above target, so each tour booking costs too much. \
              The ad assets or targeting need optimization."
            .to_string(),
        evidence,
        fixes: vec![FixSuggestion::new(
            "Audit asset group performance and pause underperformers",
            "audit_assets",
            "Reduce CPA by 30-50%",
            "annunci",
        )],
    }
}

fn ad_conversions_collapsed(ctx: &RuleContext<'_>) -> Diagnosis {
    let mut evidence = finding_only(ctx);
    if let Some(spend) = school_section(ctx, "spend").and_then(|s| number(s, "weekly_spend")) {
        evidence.push(format!(
            "Ads are still running: {} spent in the last 7 days",
            dollars(spend)
        ));
    }
    evidence.push("A sudden drop across campaigns points to tracking, not ad quality".to_string());

    Diagnosis {
        why: "Conversions fell off a cliff within a week. Real tour interest doesn't drop this fast, \
              so the conversion pixel or form tracking has most likely broken."
            .to_string(),
        evidence,
        fixes: vec![
            FixSuggestion::new(
                "Run conversion tracking audit with Bussola",
                "verify_tracking",
                "Critical: all optimization depends on accurate data",
                "bussola",
            ),
            FixSuggestion::new(
                "Check GTM tags and form submission events",
                "check_gtm",
                "Identify the exact break point",
                "bussola",
            ),
        ],
    }
}

fn ad_performing_well(ctx: &RuleContext<'_>) -> Diagnosis {
    Diagnosis {
        why: "This campaign is performing well and delivering results at or below target cost."
            .to_string(),
        evidence: finding_only(ctx),
        fixes: vec![FixSuggestion::new(
            "Consider increasing budget to get more conversions",
            "increase_budget",
            "2-3 more tours/week",
            "annunci",
        )],
    }
}

fn local_deindexed(ctx: &RuleContext<'_>) -> Diagnosis {
    let metrics = school_section(ctx, "metrics");
    let figure = |key: &str| {
        metrics
            .and_then(|m| m.get(key))
            .map_or_else(|| "?".to_string(), display_value)
    };

    Diagnosis {
        why: "Google can't find these pages, either because they were never submitted to Search \
              Console or because something like a noindex tag blocks them. The content is invisible \
              to anyone searching."
            .to_string(),
        evidence: vec![
            ctx.alert.finding.clone(),
            format!("Pages live: {}", figure("pages_live")),
            format!("Pages indexed: {}", figure("pages_indexed")),
        ],
        fixes: vec![
            FixSuggestion::new(
                "Submit all community pages to Google Search Console for indexing",
                "submit_indexing",
                format!(
                    "Recover ~{}/month in organic traffic value",
                    dollars(ctx.impact_monthly)
                ),
                "architetto",
            ),
            FixSuggestion::new(
                "Check for noindex tags or robots.txt blocks",
                "check_noindex",
                "Remove technical barriers",
                "architetto",
            ),
            FixSuggestion::new(
                "Add pages to XML sitemap",
                "update_sitemap",
                "Improve crawl discovery",
                "architetto",
            ),
        ],
    }
}

fn local_zero_results(ctx: &RuleContext<'_>) -> Diagnosis {
    Diagnosis {
        why: "The school doesn't appear in search results for this local keyword and competitors \
              take all the traffic. Rankings should improve once community pages are indexed."
            .to_string(),
        evidence: finding_only(ctx),
        fixes: vec![FixSuggestion::new(
            "Optimize community page for this keyword once indexed",
            "optimize_page",
            format!("~{}/month in organic value", dollars(ctx.impact_monthly)),
            "spia",
        )],
    }
}

fn local_not_indexed(ctx: &RuleContext<'_>) -> Diagnosis {
    Diagnosis {
        why: "This community page exists but isn't showing up in Google. It may need a manual \
              submission, or a technical issue is preventing indexing."
            .to_string(),
        evidence: finding_only(ctx),
        fixes: vec![FixSuggestion::new(
            "Submit page to Search Console and verify indexing",
            "submit_indexing",
            format!("~{}/month potential", dollars(ctx.impact_monthly)),
            "architetto",
        )],
    }
}

fn search_organic_drop(ctx: &RuleContext<'_>) -> Diagnosis {
    Diagnosis {
        why: "Organic search traffic is declining. Likely causes are an algorithm change, new \
              competitors ranking higher, or technical SEO issues."
            .to_string(),
        evidence: finding_only(ctx),
        fixes: vec![
            FixSuggestion::new(
                "Audit affected pages for technical SEO issues",
                "seo_audit",
                "Recover lost organic traffic",
                "spia",
            ),
            FixSuggestion::new(
                "Check for SERP changes and new competitors",
                "competitor_check",
                "Understand competitive landscape",
                "spia",
            ),
        ],
    }
}

fn search_weak_rankings(ctx: &RuleContext<'_>) -> Diagnosis {
    Diagnosis {
        why: "Content targeting these keywords isn't strong enough to compete. The pages need \
              better optimization, more internal links and stronger authority signals."
            .to_string(),
        evidence: finding_only(ctx),
        fixes: vec![FixSuggestion::new(
            "Optimize content with better keyword targeting and internal links",
            "optimize_content",
            "Improve rankings to page 1",
            "penna",
        )],
    }
}

fn analytics_no_conversions(ctx: &RuleContext<'_>) -> Diagnosis {
    Diagnosis {
        why: "People are visiting the site but nobody converts. The contact form may be broken, \
              the tracking code may not be firing, or the landing page isn't compelling."
            .to_string(),
        evidence: finding_only(ctx),
        fixes: vec![FixSuggestion::new(
            "Test all forms manually and check GTM setup",
            "check_forms",
            "Fix conversion path",
            "bussola",
        )],
    }
}

fn analytics_bounce(ctx: &RuleContext<'_>) -> Diagnosis {
    let mut evidence = finding_only(ctx);
    if let Some(rate) = school_section(ctx, "metrics").and_then(|m| number(m, "bounce_rate")) {
        evidence.push(format!("Site-wide bounce rate for {}: {rate}%", ctx.alert.school));
    }

    Diagnosis {
        why: "Visitors leave without interacting. The landing page may be slow, confusing, or not \
              match what the ad promised."
            .to_string(),
        evidence,
        fixes: vec![FixSuggestion::new(
            "Optimize landing page UX and load time",
            "optimize_page",
            "Reduce bounce rate, increase conversions",
            "architetto",
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_combinators() {
        let high_cpa = AllOf(&[Contains("cpa"), AnyOf(&[Contains("high"), Contains("2.")])]);
        assert!(high_cpa.matches("cpa is 2.4x target"));
        assert!(high_cpa.matches("cpa running high"));
        assert!(!high_cpa.matches("cpa on target"));
        assert!(!high_cpa.matches("spend running high"));
    }

    #[test]
    fn test_rule_names_are_unique_per_domain() {
        for (i, rule) in RULES.iter().enumerate() {
            assert!(
                !RULES[..i]
                    .iter()
                    .any(|r| r.domain == rule.domain && r.name == rule.name),
                "duplicate rule {}",
                rule.name
            );
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // "dropped" plus "conversion" would also match the collapse rule
        let rule = find_rule(Domain::AdSpend, "zero conversions, conversions dropped").unwrap();
        assert_eq!(rule.name, "zero_conversions");

        let rule = find_rule(Domain::LocalSearch, "12 pages deindexed, zero results").unwrap();
        assert_eq!(rule.name, "deindexed_pages");
    }

    #[test]
    fn test_rules_are_scoped_to_domain() {
        assert!(find_rule(Domain::Reputation, "zero conversions").is_none());
        assert!(find_rule(Domain::General, "bounce rate up").is_none());
        assert_eq!(
            find_rule(Domain::Analytics, "bounce rate up").unwrap().name,
            "high_bounce"
        );
    }

    #[test]
    fn test_dollars_formatting() {
        assert_eq!(dollars(1680.0), "$1680");
        assert_eq!(dollars(12.5), "$12.50");
        assert_eq!(dollars(0.0), "$0");
    }
}
