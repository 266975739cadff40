//! Free-text query reduction to a controlled-vocabulary expression.
//!
//! PubMed precision improves sharply when queries use subject headings
//! instead of prose. The reduction is purely lexical: a known condition
//! phrase wins outright; otherwise filler is stripped and the remaining
//! content words are mapped through a fixed term table and AND-joined.

/// Condition phrases checked first, longest match wins. The phrase match is
/// case-insensitive and substring-based, so "stage IV breast cancer
/// treatment" still hits "breast cancer".
const CONDITIONS: &[(&str, &str)] = &[
    ("breast cancer", "Breast Neoplasms"),
    ("lung cancer", "Lung Neoplasms"),
    ("prostate cancer", "Prostatic Neoplasms"),
    ("colorectal cancer", "Colorectal Neoplasms"),
    ("pancreatic cancer", "Pancreatic Neoplasms"),
    ("skin cancer", "Skin Neoplasms"),
    ("leukemia", "Leukemia"),
    ("lymphoma", "Lymphoma"),
    ("melanoma", "Melanoma"),
    ("type 1 diabetes", "Diabetes Mellitus, Type 1"),
    ("type 2 diabetes", "Diabetes Mellitus, Type 2"),
    ("gestational diabetes", "Diabetes, Gestational"),
    ("diabetes", "Diabetes Mellitus"),
    ("covid-19", "COVID-19"),
    ("covid", "COVID-19"),
    ("coronavirus", "Coronavirus Infections"),
    ("influenza", "Influenza, Human"),
    ("flu", "Influenza, Human"),
    ("tuberculosis", "Tuberculosis"),
    ("malaria", "Malaria"),
    ("hiv", "HIV Infections"),
    ("aids", "Acquired Immunodeficiency Syndrome"),
    ("hepatitis b", "Hepatitis B"),
    ("hepatitis c", "Hepatitis C"),
    ("alzheimer", "Alzheimer Disease"),
    ("parkinson", "Parkinson Disease"),
    ("multiple sclerosis", "Multiple Sclerosis"),
    ("hypertension", "Hypertension"),
    ("high blood pressure", "Hypertension"),
    ("asthma", "Asthma"),
    ("obesity", "Obesity"),
    ("stroke", "Stroke"),
    ("depression", "Depressive Disorder"),
    ("anxiety", "Anxiety Disorders"),
];

/// Generic content words mapped to their heading equivalents.
const TERMS: &[(&str, &str)] = &[
    ("treatment", "Therapeutics"),
    ("treatments", "Therapeutics"),
    ("therapy", "Therapeutics"),
    ("drug", "Pharmaceutical Preparations"),
    ("drugs", "Pharmaceutical Preparations"),
    ("medication", "Pharmaceutical Preparations"),
    ("vaccine", "Vaccines"),
    ("vaccines", "Vaccines"),
    ("vaccination", "Vaccination"),
    ("diagnosis", "Diagnosis"),
    ("screening", "Mass Screening"),
    ("prevention", "Primary Prevention"),
    ("symptoms", "Signs and Symptoms"),
    ("symptom", "Signs and Symptoms"),
    ("cause", "Etiology"),
    ("causes", "Etiology"),
    ("risk", "Risk Factors"),
    ("risks", "Risk Factors"),
    ("prognosis", "Prognosis"),
    ("mortality", "Mortality"),
    ("epidemiology", "Epidemiology"),
    ("genetics", "Genetics"),
    ("surgery", "Surgical Procedures, Operative"),
    ("rehabilitation", "Rehabilitation"),
    ("nutrition", "Nutritional Physiological Phenomena"),
    ("diet", "Diet"),
    ("exercise", "Exercise"),
    ("children", "Child"),
    ("elderly", "Aged"),
    ("pregnancy", "Pregnancy"),
];

/// Leading filler stripped before word-level mapping.
const FILLER_PHRASES: &[&str] = &[
    "what is",
    "what are",
    "how to",
    "how do",
    "tell me about",
    "research on",
    "research about",
    "studies on",
    "studies about",
    "articles about",
    "articles on",
    "effects of",
    "latest research",
    "recent studies",
    "information on",
    "information about",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "about", "best", "can", "do", "does", "for", "how", "in", "is",
    "it", "latest", "new", "of", "on", "or", "recent", "the", "to", "what", "which", "with",
];

/// Reduce a free-text query to a controlled-vocabulary expression.
///
/// Falls back to the trimmed original text when nothing maps.
pub fn to_mesh_query(query: &str) -> String {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();

    // A recognized condition dominates everything else in the query.
    for (phrase, heading) in CONDITIONS {
        if lower.contains(phrase) {
            let mut terms = vec![format!("\"{heading}\"[MeSH Terms]")];
            terms.extend(map_content_words(&strip_phrase(&lower, phrase)));
            return terms.join(" AND ");
        }
    }

    let stripped = strip_filler(&lower);
    let terms = map_content_words(&stripped);
    if terms.is_empty() {
        trimmed.to_string()
    } else {
        terms.join(" AND ")
    }
}

fn strip_phrase(text: &str, phrase: &str) -> String {
    text.replacen(phrase, " ", 1)
}

fn strip_filler(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in FILLER_PHRASES {
        if let Some(rest) = out.strip_prefix(phrase) {
            out = rest.trim_start().to_string();
        }
    }
    out
}

fn map_content_words(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .filter_map(|word| {
            TERMS
                .iter()
                .find(|(k, _)| *k == word)
                .map(|(_, heading)| format!("\"{heading}\"[MeSH Terms]"))
        })
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_phrase_maps_to_heading() {
        assert_eq!(
            to_mesh_query("breast cancer"),
            "\"Breast Neoplasms\"[MeSH Terms]"
        );
    }

    #[test]
    fn condition_detected_inside_longer_query() {
        let q = to_mesh_query("latest research on type 2 diabetes treatment");
        assert!(q.contains("\"Diabetes Mellitus, Type 2\"[MeSH Terms]"));
        assert!(q.contains(" AND \"Therapeutics\"[MeSH Terms]"));
    }

    #[test]
    fn specific_condition_wins_over_general() {
        // "type 2 diabetes" is listed before plain "diabetes".
        let q = to_mesh_query("type 2 diabetes");
        assert!(q.starts_with("\"Diabetes Mellitus, Type 2\""));
    }

    #[test]
    fn generic_words_mapped_and_conjoined() {
        let q = to_mesh_query("vaccine risks in children");
        assert_eq!(
            q,
            "\"Vaccines\"[MeSH Terms] AND \"Risk Factors\"[MeSH Terms] AND \"Child\"[MeSH Terms]"
        );
    }

    #[test]
    fn filler_and_stopwords_are_stripped() {
        let q = to_mesh_query("what is the treatment for influenza");
        assert!(q.contains("\"Influenza, Human\"[MeSH Terms]"));
        assert!(q.contains("\"Therapeutics\"[MeSH Terms]"));
        assert!(!q.contains("what"));
    }

    #[test]
    fn unmapped_query_falls_back_to_trimmed_original() {
        assert_eq!(to_mesh_query("  quantum chromodynamics  "), "quantum chromodynamics");
    }

    #[test]
    fn duplicate_headings_collapse() {
        let q = to_mesh_query("drug drugs medication");
        assert_eq!(q, "\"Pharmaceutical Preparations\"[MeSH Terms]");
    }
}
