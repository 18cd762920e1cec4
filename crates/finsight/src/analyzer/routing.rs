use std::fmt;

/// A specialist the crew can run.
///
/// Variants are declared in invocation order; [`route`] relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Verification,
    FinancialAnalysis,
    InvestmentAdvice,
    RiskAssessment,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Verification,
        Capability::FinancialAnalysis,
        Capability::InvestmentAdvice,
        Capability::RiskAssessment,
    ];

    /// Lowercase substrings that select this capability. Empty means always.
    pub fn triggers(&self) -> &'static [&'static str] {
        match self {
            Capability::Verification => &[],
            Capability::FinancialAnalysis => {
                &["analyze", "summary", "overview", "figures", "performance"]
            }
            Capability::InvestmentAdvice => {
                &["invest", "buy", "sell", "recommendation", "portfolio"]
            }
            Capability::RiskAssessment => &["risk", "threat", "downside", "concern", "exposure"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Verification => "verification",
            Capability::FinancialAnalysis => "financial_analysis",
            Capability::InvestmentAdvice => "investment_advice",
            Capability::RiskAssessment => "risk_assessment",
        }
    }

    fn selected_by(&self, query_lower: &str) -> bool {
        let triggers = self.triggers();
        triggers.is_empty() || triggers.iter().any(|t| query_lower.contains(t))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects the capabilities for `query`, in invocation order.
///
/// Matching is case-insensitive substring search. Verification is always
/// first, so a query with no trigger words runs verification alone.
pub fn route(query: &str) -> Vec<Capability> {
    let query_lower = query.to_lowercase();
    Capability::ALL
        .into_iter()
        .filter(|c| c.selected_by(&query_lower))
        .collect()
}
