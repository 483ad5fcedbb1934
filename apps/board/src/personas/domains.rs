//! Domain-indicator phrases per persona, used to route ranked keywords to
//! the reviewer most likely to care about them.

use super::Persona;

const HR: &[&str] = &[
    "cultural fit",
    "communication skills",
    "teamwork and collaboration",
    "interpersonal skills",
    "career progression",
    "professional development",
    "conflict resolution",
    "employee engagement",
    "diversity equity inclusion",
    "hiring recruiting onboarding",
    "stakeholder relationships",
    "work ethic adaptability",
];

const TECHNICAL: &[&str] = &[
    "software engineering",
    "system architecture",
    "programming languages python java rust go",
    "cloud infrastructure aws azure gcp",
    "distributed systems microservices",
    "database design sql",
    "api development rest graphql",
    "devops ci/cd kubernetes docker",
    "machine learning data pipelines",
    "testing automation",
    "security compliance",
    "performance optimization scalability",
];

const DESIGN: &[&str] = &[
    "user experience ux",
    "user interface ui",
    "visual design typography",
    "design systems",
    "prototyping wireframing figma",
    "usability testing user research",
    "accessibility",
    "interaction design",
    "product design",
    "information architecture",
    "brand consistency",
];

const FINANCE: &[&str] = &[
    "budget management",
    "cost reduction savings",
    "financial analysis modeling",
    "return on investment roi",
    "revenue growth",
    "forecasting planning",
    "p&l ownership",
    "pricing strategy",
    "resource allocation",
    "operational efficiency",
    "vendor contract negotiation",
];

const CEO: &[&str] = &[
    "strategic vision",
    "business strategy",
    "executive leadership",
    "market expansion",
    "growth strategy",
    "competitive advantage",
    "organizational transformation",
    "board and investor relations",
    "mergers acquisitions partnerships",
    "innovation entrepreneurship",
    "company culture mission",
];

const TEAM: &[&str] = &[
    "mentoring coaching",
    "code review",
    "agile scrum kanban",
    "sprint planning",
    "cross-functional collaboration",
    "team leadership",
    "knowledge sharing documentation",
    "pair programming",
    "delivery execution",
    "project management",
    "on-call ownership",
];

/// Fixed bag of lowercase phrases that characterise a persona's domain.
pub fn indicators(persona: Persona) -> &'static [&'static str] {
    match persona {
        Persona::Hr => HR,
        Persona::Technical => TECHNICAL,
        Persona::Design => DESIGN,
        Persona::Finance => FINANCE,
        Persona::Ceo => CEO,
        Persona::Team => TEAM,
    }
}
