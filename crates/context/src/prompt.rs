//! Prompt library
//!
//! Named templates with `{context}` and `{query}` placeholders, plus the
//! rendering of retrieved chunks into prompt context.

use artalk_common::models::Chunk;
use regex_lite::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

/// Template used when the caller names none
pub const DEFAULT_TEMPLATE: &str = "default";

/// Context handed to the model when no collection was given or retrieval failed
pub const NO_CONTEXT_PROMPT: &str =
    "Pas de contexte pour cette requête, répond simplement à la question";

const DEFAULT: &str = "\
Voici le contexte :
{context}

Question : {query}";

const TECHNICAL_SPEC: &str = "\
Tu es un agent technique spécialiste des spécifications d'installations.
Base toi uniquement sur le contexte donné pour répondre à la question, avec une grande fidélité au document d'origine.
Ta réponse doit contenir une liste exhaustive des éléments de contexte pertinents.
Dans le contexte, les chunk_number t'indiquent dans quel ordre lire les documents.
Si tu ne sais pas, dis que tu ne sais pas. Tu as interdiction d'inventer des réponses.
Réponds en français.
DEBUT DU CONTEXTE
{context}
FIN DU CONTEXTE
DEBUT DE LA QUESTION
Question : {query}
FIN DE LA QUESTION";

const ART_GUIDE: &str = "\
Tu es un expert en art. Tu réponds aux questions d'un visiteur de musée qui se trouve face à une oeuvre.
Ne pose jamais de question dans ta réponse sauf si le visiteur le demande explicitement.
Ta réponse sera lue par un modèle text-to-speech : n'écris rien de difficile à prononcer, par exemple écris 'quatorze' plutôt que 'XIV'.
Dans le contexte, les chunk_number t'indiquent dans quel ordre lire les documents.
Si la question ne concerne pas l'art, rappelle au visiteur que tu ne réponds qu'aux questions sur l'art.
Si tu ne sais pas, dis que tu ne sais pas.
DEBUT DU CONTEXTE
{context}
FIN DU CONTEXTE
DEBUT DE LA QUESTION
Question : {query}
FIN DE LA QUESTION";

static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();

/// Substitute `{name}` placeholders. Unknown placeholders are left as written.
pub fn fill(template: &str, vars: &HashMap<&str, &str>) -> String {
    let Some(placeholder) = PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").ok()) else {
        return template.to_string();
    };
    placeholder
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Registry of prompt templates by name
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        let mut library = Self::empty();
        library.register(DEFAULT_TEMPLATE, DEFAULT);
        library.register("technical_spec", TECHNICAL_SPEC);
        library.register("art_guide", ART_GUIDE);
        library
    }
}

impl PromptLibrary {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the final prompt.
    ///
    /// `None` selects the default template. An unknown name falls back to the
    /// bare query.
    pub fn render(&self, template: Option<&str>, context: &str, query: &str) -> String {
        let name = template.unwrap_or(DEFAULT_TEMPLATE);
        match self.get(name) {
            Some(body) => {
                let vars = HashMap::from([("context", context), ("query", query)]);
                fill(body, &vars)
            }
            None => {
                warn!(template = name, "Unknown prompt template, sending the bare query");
                query.to_string()
            }
        }
    }
}

/// Render expanded chunks as prompt context, optionally preceded by artwork context.
///
/// Chunks are written in the order given, each tagged with its chunk number.
pub fn render_context(artwork_context: Option<&str>, chunks: &[Chunk]) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(chunks.len() + 1);
    if let Some(artwork) = artwork_context.filter(|s| !s.is_empty()) {
        sections.push(artwork.to_string());
    }
    for chunk in chunks {
        let header = match chunk.source() {
            Some(source) => format!("[chunk_number {} | {}]", chunk.chunk_number, source),
            None => format!("[chunk_number {}]", chunk.chunk_number),
        };
        sections.push(format!("{}\n{}", header, chunk.text));
    }

    if sections.is_empty() {
        NO_CONTEXT_PROMPT.to_string()
    } else {
        sections.join("\n\n")
    }
}
