//! Prompt templates for question generation and CEFR feedback.
//!
//! Feedback is requested as Markdown with one bold heading per rubric
//! section. [`missing_sections`] checks a reply against those headings.

use crate::language::Language;

/// One section of the oral-proficiency feedback rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricSection {
    /// Grammar and vocabulary.
    Accuracy,
    /// Flow of speech and ease of expression.
    Fluency,
    /// Ability to respond and engagement.
    Interaction,
    /// Logical structure and clarity.
    Coherence,
    /// Variety of expressions.
    Range,
    /// Overall level, A1 to C2.
    OverallLevel,
    /// Concrete tips.
    Suggestions,
}

impl RubricSection {
    /// All sections in the order they are requested.
    pub const ALL: [Self; 7] = [
        Self::Accuracy,
        Self::Fluency,
        Self::Interaction,
        Self::Coherence,
        Self::Range,
        Self::OverallLevel,
        Self::Suggestions,
    ];

    /// The localized heading the model is asked to use.
    #[must_use]
    pub const fn heading(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Accuracy, Language::German) => "Genauigkeit",
            (Self::Accuracy, Language::English) => "Accuracy",
            (Self::Accuracy, Language::French) => "Précision",
            (Self::Fluency, Language::German) => "Flüssigkeit",
            (Self::Fluency, Language::English) => "Fluency",
            (Self::Fluency, Language::French) => "Fluidité",
            (Self::Interaction, Language::German) => "Interaktion",
            (Self::Interaction, Language::English | Language::French) => "Interaction",
            (Self::Coherence, Language::German) => "Kohärenz",
            (Self::Coherence, Language::English) => "Coherence",
            (Self::Coherence, Language::French) => "Cohérence",
            (Self::Range, Language::German) => "Umfang",
            (Self::Range, Language::English) => "Range",
            (Self::Range, Language::French) => "Étendue",
            (Self::OverallLevel, Language::German) => "Gesamtniveau nach GER",
            (Self::OverallLevel, Language::English) => "Overall CEFR level",
            (Self::OverallLevel, Language::French) => "Niveau global CECR",
            (Self::Suggestions, Language::German) => "Verbesserungsvorschläge",
            (Self::Suggestions, Language::English) => "Improvement suggestions",
            (Self::Suggestions, Language::French) => "Suggestions d'amélioration",
        }
    }

    const fn hint(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Accuracy, Language::German) => "Grammatik und Wortschatz",
            (Self::Accuracy, Language::English) => "Grammar and vocabulary",
            (Self::Accuracy, Language::French) => "Grammaire et vocabulaire",
            (Self::Fluency, Language::German) => "Sprachfluss und Ausdrucksfähigkeit",
            (Self::Fluency, Language::English) => "Flow of speech and ease of expression",
            (Self::Fluency, Language::French) => "Flux de parole et aisance d'expression",
            (Self::Interaction, Language::German) => "Reaktionsfähigkeit und Engagement",
            (Self::Interaction, Language::English) => "Ability to respond and engagement",
            (Self::Interaction, Language::French) => "Capacité à répondre et engagement",
            (Self::Coherence, Language::German) => "Logische Struktur und Klarheit",
            (Self::Coherence, Language::English) => "Logical structure and clarity",
            (Self::Coherence, Language::French) => "Structure logique et clarté",
            (Self::Range, Language::German) => {
                "Vielfalt der Ausdrücke und Wortschatzerweiterung"
            }
            (Self::Range, Language::English) => {
                "Variety of expressions and vocabulary expansion"
            }
            (Self::Range, Language::French) => {
                "Variété des expressions et enrichissement du vocabulaire"
            }
            (Self::OverallLevel, Language::German) => "A1, A2, B1, B2, C1 oder C2",
            (Self::OverallLevel, Language::English) => "A1, A2, B1, B2, C1, or C2",
            (Self::OverallLevel, Language::French) => "A1, A2, B1, B2, C1, ou C2",
            (Self::Suggestions, Language::German) => "konkrete Tipps zur Verbesserung",
            (Self::Suggestions, Language::English) => "specific tips for improvement",
            (Self::Suggestions, Language::French) => {
                "conseils spécifiques pour l'amélioration"
            }
        }
    }
}

impl std::fmt::Display for RubricSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.heading(Language::English))
    }
}

/// Builds the question-generation prompt for `topic`.
///
/// Unknown languages use the German template.
#[must_use]
pub fn question_prompt(topic: &str, language: Option<Language>) -> String {
    match language.unwrap_or(Language::German) {
        Language::German => format!(
            "Erzeuge eine einfache, natürliche Frage über {topic}, die ein Kunde, Patient oder \
             Gesprächspartner stellen könnte. Die Frage soll konkret beantwortbar sein und \
             natürlich formuliert."
        ),
        Language::English => format!(
            "Generate a single, direct question about {topic} that a customer, patient, or \
             conversation partner might ask. The question should be phrased naturally and \
             require a concrete answer."
        ),
        Language::French => format!(
            "Génère une question simple et directe sur {topic} qu'un client, un patient ou un \
             interlocuteur pourrait poser. La question doit être formulée naturellement et \
             demander une réponse concrète."
        ),
    }
}

/// Builds the CEFR feedback prompt for an answer to `question`.
///
/// Unknown languages use the English template.
#[must_use]
pub fn feedback_prompt(question: &str, transcription: &str, language: Option<Language>) -> String {
    let language = language.unwrap_or(Language::English);
    let (header, instructions) = match language {
        Language::German => (
            format!("Frage: {question}\nAntwort des Schülers: {transcription}"),
            "Bitte gib ein strukturiertes Feedback nach den GER-Kriterien für mündliche \
             Sprachkompetenz. Formatiere die Ausgabe in Markdown ohne Meta-Kommentare. \
             Beinhaltet die Abschnitte:",
        ),
        Language::English => (
            format!("Question: {question}\nStudent's response: {transcription}"),
            "Please provide structured feedback according to the CEFR criteria for oral \
             language proficiency. Format the output in Markdown without meta commentary. \
             Include sections on:",
        ),
        Language::French => (
            format!("Question : {question}\nRéponse de l'étudiant : {transcription}"),
            "Veuillez fournir un retour structuré selon les critères du CECR pour la \
             compétence orale. Formatez la sortie en Markdown sans commentaire méta. \
             Incluez les sections suivantes :",
        ),
    };

    // French typography puts a space before the colon.
    let colon = if language == Language::French { " :" } else { ":" };
    let sections: String = RubricSection::ALL
        .iter()
        .map(|section| {
            format!(
                "**{}{colon}** ({})\n",
                section.heading(language),
                section.hint(language)
            )
        })
        .collect();

    format!("{header}\n\n{instructions}\n\n{sections}\n")
}

/// Returns the rubric sections whose heading does not appear in `feedback`.
///
/// Matching is case-insensitive on the plain text, so Markdown emphasis
/// around a heading does not matter.
#[must_use]
pub fn missing_sections(feedback: &str, language: Option<Language>) -> Vec<RubricSection> {
    let language = language.unwrap_or(Language::English);
    let plain = quest_narration::markdown_to_text(feedback).to_lowercase();
    RubricSection::ALL
        .into_iter()
        .filter(|section| !plain.contains(&section.heading(language).to_lowercase()))
        .collect()
}
