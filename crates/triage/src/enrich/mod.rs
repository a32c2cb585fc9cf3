//! Enrichment engine.
//!
//! Turns a terse raw alert into a diagnosis with evidence and suggested fixes.
//! Enrichment is pure and never fails; unmatched findings get a manual review
//! fallback.

pub mod rules;

use sha1::{Digest, Sha1};

use crate::agents::AgentDescriptor;
use crate::model::{CanonicalReport, EnrichedAlert, FixSuggestion, ImpactType, RawAlert};
use rules::{find_rule, Diagnosis, RuleContext};

/// Size of the numeric suffix space in alert ids.
pub const ALERT_ID_RANGE: u64 = 10_000;

/// Weeks per month used to project weekly impact.
pub const WEEKS_PER_MONTH: f64 = 4.0;

const FALLBACK_WHY: &str = "Investigation needed to determine root cause.";
const FALLBACK_FIX: &str = "Review and take action";

/// Stable id `{school}-{agent}-{n}` where `n` is derived from the finding.
///
/// Distinct findings can collide within the same school and agent.
#[must_use]
pub fn alert_id(school: &str, agent_id: &str, finding: &str) -> String {
    let digest = Sha1::digest(finding.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(head) % ALERT_ID_RANGE;
    format!("{school}-{agent_id}-{n}")
}

/// Monthly projection of a weekly impact; zero for non-positive input.
#[must_use]
pub fn monthly_impact(impact_dollars: f64) -> f64 {
    if impact_dollars > 0.0 {
        impact_dollars * WEEKS_PER_MONTH
    } else {
        0.0
    }
}

/// Enrich one raw alert produced by `agent`.
#[must_use]
pub fn enrich(alert: &RawAlert, agent: &AgentDescriptor, report: &CanonicalReport) -> EnrichedAlert {
    let impact_monthly = monthly_impact(alert.impact_dollars);
    let impact_type = if agent.domain.reports_measured_impact() && alert.impact_dollars > 0.0 {
        ImpactType::Confirmed
    } else {
        ImpactType::Estimated
    };
    let assigned_to = alert
        .assigned_to
        .clone()
        .unwrap_or_else(|| agent.id.clone());

    let finding_lower = alert.finding.to_lowercase();
    let ctx = RuleContext {
        alert,
        agent_id: &agent.id,
        report,
        impact_monthly,
    };
    let diagnosis = match find_rule(agent.domain, &finding_lower) {
        Some(rule) => (rule.diagnose)(&ctx),
        None => manual_review(&ctx, &assigned_to),
    };

    EnrichedAlert {
        alert_id: alert_id(&alert.school, &agent.id, &alert.finding),
        agent: agent.id.clone(),
        level: alert.level.clone(),
        school: alert.school.clone(),
        title: alert.finding.clone(),
        impact_monthly,
        impact_type,
        why: diagnosis.why,
        evidence: diagnosis.evidence,
        fixes: diagnosis.fixes,
        assigned_to,
    }
}

/// Enrich every alert in a report.
#[must_use]
pub fn enrich_report(agent: &AgentDescriptor, report: &CanonicalReport) -> Vec<EnrichedAlert> {
    report
        .alerts
        .iter()
        .map(|alert| enrich(alert, agent, report))
        .collect()
}

fn manual_review(ctx: &RuleContext<'_>, assignee: &str) -> Diagnosis {
    let action = ctx
        .alert
        .action_required
        .as_deref()
        .filter(|a| !a.trim().is_empty());

    Diagnosis {
        why: action.unwrap_or(FALLBACK_WHY).to_string(),
        evidence: vec![ctx.alert.finding.clone()],
        fixes: vec![FixSuggestion::new(
            action.unwrap_or(FALLBACK_FIX),
            "manual_review",
            "TBD",
            assignee,
        )],
    }
}
