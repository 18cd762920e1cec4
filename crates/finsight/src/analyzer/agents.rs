//! Agent personas and step instructions for each [`Capability`].
//!
//! Templates use `{query}` and `{file_name}` placeholders, filled by
//! [`render`] before a step is sent to the model.

use super::routing::Capability;

pub struct AgentProfile {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

pub struct StepTemplate {
    pub description: &'static str,
    pub expected_output: &'static str,
    /// Earlier steps whose output is passed along, when they ran.
    pub context: &'static [Capability],
}

const VERIFIER: AgentProfile = AgentProfile {
    role: "Financial Document Verifier",
    goal: "Verify whether the given file is a valid financial document (report, statement, \
           or earnings update) and explain why.",
    backstory: "You have experience in financial compliance and document verification. You read \
                file content carefully and look for the usual markers of a financial document: \
                figures, tables, fiscal periods, GAAP/IFRS or similar terminology, revenue and \
                expense breakdowns. You give a clear yes/no conclusion with a brief justification \
                based on the actual content.",
};

const FINANCIAL_ANALYST: AgentProfile = AgentProfile {
    role: "Senior Financial Analyst",
    goal: "Provide accurate, evidence-based analysis of financial documents to address the \
           user's query: {query}",
    backstory: "You are an experienced financial analyst with strong knowledge of financial \
                statements, corporate reports and market dynamics. You cite specific figures and \
                sections, and you keep facts from the document apart from your interpretation. \
                You do not speculate, fabricate URLs or make unsubstantiated claims.",
};

const INVESTMENT_ADVISOR: AgentProfile = AgentProfile {
    role: "Investment Advisor",
    goal: "Provide investment insights and recommendations grounded in the financial document \
           and the user query: {query}",
    backstory: "You are a qualified investment advisor who bases recommendations on document \
                evidence. You explain which metrics and sections support your view, include \
                appropriate caveats, and never recommend products or returns the document does \
                not support.",
};

const RISK_ASSESSOR: AgentProfile = AgentProfile {
    role: "Risk Assessment Analyst",
    goal: "Identify and explain risks present in the financial document relevant to the \
           user's query: {query}",
    backstory: "You are a risk analyst who identifies market, credit, operational and other \
                risks from financial documents. You cite the sections or figures behind each \
                risk, use standard risk terminology, and suggest realistic mitigations without \
                inventing extreme scenarios.",
};

const VERIFY_STEP: StepTemplate = StepTemplate {
    description: "Verify whether the document '{file_name}' is a valid financial document \
                  (for example a report, statement or earnings update). Check the text below \
                  for financial figures, tables, fiscal periods and GAAP/IFRS terms. Respond \
                  with a clear yes or no and a short justification based on the content.",
    expected_output: "A short verification result: yes or no, with one or two sentences of \
                      justification based on the document content.",
    context: &[],
};

const ANALYZE_STEP: StepTemplate = StepTemplate {
    description: "Analyze the financial document '{file_name}' to address: {query}\n\
                  Provide evidence-based analysis of key figures, trends, risks and \
                  implications. Base your response only on the document. Do not speculate or \
                  invent sources.",
    expected_output: "A structured analysis including:\n\
                      - Summary of the document and key figures\n\
                      - Relevant risks and opportunities\n\
                      - Investment-related insights grounded in the document\n\
                      - Professional language without fabricated sources",
    context: &[Capability::Verification],
};

const INVEST_STEP: StepTemplate = StepTemplate {
    description: "Using the findings on '{file_name}', provide investment insights for: {query}\n\
                  Tie every recommendation to metrics from the document. Include caveats and \
                  avoid unsupported claims.",
    expected_output: "Structured investment analysis:\n\
                      - Key metrics from the document relevant to the query\n\
                      - Recommendations tied to those metrics\n\
                      - Clear caveats and cited data sources",
    context: &[Capability::FinancialAnalysis],
};

const RISK_STEP: StepTemplate = StepTemplate {
    description: "Using the findings on '{file_name}', produce a risk assessment relevant to: \
                  {query}\n\
                  Only identify risks actually stated or implied in the document. Use standard \
                  risk terminology (market, credit, operational, liquidity and so on).",
    expected_output: "Structured risk assessment:\n\
                      - Risks identified from the document with supporting evidence\n\
                      - Risk category labels (market, credit, operational, etc.)\n\
                      - Realistic mitigations or caveats",
    context: &[Capability::FinancialAnalysis],
};

pub fn profile(capability: Capability) -> &'static AgentProfile {
    match capability {
        Capability::Verification => &VERIFIER,
        Capability::FinancialAnalysis => &FINANCIAL_ANALYST,
        Capability::InvestmentAdvice => &INVESTMENT_ADVISOR,
        Capability::RiskAssessment => &RISK_ASSESSOR,
    }
}

pub fn step(capability: Capability) -> &'static StepTemplate {
    match capability {
        Capability::Verification => &VERIFY_STEP,
        Capability::FinancialAnalysis => &ANALYZE_STEP,
        Capability::InvestmentAdvice => &INVEST_STEP,
        Capability::RiskAssessment => &RISK_STEP,
    }
}

/// Fills `{query}` and `{file_name}` in a template.
pub fn render(template: &str, query: &str, file_name: &str) -> String {
    template
        .replace("{query}", query)
        .replace("{file_name}", file_name)
}

/// System prompt that puts the model in the agent's role.
pub fn system_prompt(capability: Capability, query: &str) -> String {
    let agent = profile(capability);
    format!(
        "You are the {}.\n{}\n\nYour goal: {}",
        agent.role,
        agent.backstory,
        render(agent.goal, query, "")
    )
}
