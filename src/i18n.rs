//! UI strings for the diagnosis chat, one complete set per supported language.

use serde::Serialize;

use crate::models::settings::Language;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStrings {
    pub title: &'static str,
    pub placeholder: &'static str,
    pub analyzing: &'static str,
    pub send: &'static str,
    pub suggestions: &'static [&'static str],
    pub disclaimer: &'static str,
    pub greeting: &'static str,
    /// Text of the user turn that carries an uploaded photo.
    pub image_caption: &'static str,
    /// Shown in place of a diagnosis when the remote call fails.
    pub error_fallback: &'static str,
    /// Shown when an uploaded file cannot be used.
    pub image_error: &'static str,
    pub user_label: &'static str,
    pub assistant_label: &'static str,
}

static ES: ChatStrings = ChatStrings {
    title: "Diagnóstico IA",
    placeholder: "Describe los síntomas de tu cultivo o sube una foto...",
    analyzing: "Papandes AI está analizando...",
    send: "Enviar",
    suggestions: &[
        "¿Cómo identifico el tizón tardío?",
        "Manchas marrones en las hojas",
        "Plan de tratamiento orgánico",
    ],
    disclaimer: "La IA puede cometer errores. Confirma el diagnóstico con un agrónomo.",
    greeting: "¡Hola! Soy tu asistente de Papandes. ¿Has notado algo inusual en tus cultivos hoy? Puedes subir una foto para un diagnóstico rápido.",
    image_caption: "Analiza esta hoja, por favor.",
    error_fallback: "Lo siento, hubo un error al procesar tu solicitud. Por favor intenta de nuevo.",
    image_error: "No pude leer esa imagen. Sube una foto JPEG de la hoja e intenta de nuevo.",
    user_label: "Agricultor",
    assistant_label: "Papandes AI",
};

static EN: ChatStrings = ChatStrings {
    title: "AI Diagnosis",
    placeholder: "Describe your crop's symptoms or upload a photo...",
    analyzing: "Papandes AI is analyzing...",
    send: "Send",
    suggestions: &[
        "How do I identify late blight?",
        "Brown spots on the leaves",
        "Organic treatment plan",
    ],
    disclaimer: "AI can make mistakes. Confirm the diagnosis with an agronomist.",
    greeting: "Hello! I am your Papandes assistant. Noticed anything unusual in your crops today? You can upload a photo for a quick diagnosis.",
    image_caption: "Analyze this leaf, please.",
    error_fallback: "Sorry, there was an error processing your request. Please try again.",
    image_error: "I couldn't read that image. Upload a JPEG photo of the leaf and try again.",
    user_label: "Farmer",
    assistant_label: "Papandes AI",
};

pub fn chat_strings(language: Language) -> &'static ChatStrings {
    match language {
        Language::Es => &ES,
        Language::En => &EN,
    }
}
