//! Context assembly and prompt construction.
//!
//! The locale only picks the wording of the system prompt; the assembly
//! logic is the same for every locale.

use super::Locale;
use crate::provider::{Message, Role};

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Joins retrieved chunks into one context block of at most `max_chars`
/// characters.
///
/// Chunks are kept in retrieval order and whole where possible. The chunk
/// that would cross the bound is cut at a character boundary and nothing
/// after it is added. No chunks gives an empty block.
pub fn assemble_context(chunks: &[String], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for chunk in chunks.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        let separator = if context.is_empty() { 0 } else { CONTEXT_SEPARATOR.len() };
        let remaining = max_chars.saturating_sub(used + separator);
        if remaining == 0 {
            break;
        }

        if separator > 0 {
            context.push_str(CONTEXT_SEPARATOR);
        }

        let chunk_chars = chunk.chars().count();
        if chunk_chars <= remaining {
            context.push_str(chunk);
            used += separator + chunk_chars;
        } else {
            context.extend(chunk.chars().take(remaining));
            break;
        }
    }

    context
}

/// Builds the system prompt.
///
/// With a non-empty context the prompt embeds it and tells the model to
/// answer from it. With an empty context it falls back to general teaching
/// guidance and contains nothing document-derived.
pub fn system_prompt(context: &str, locale: Locale) -> String {
    if context.trim().is_empty() {
        return general_prompt(locale).to_string();
    }

    match locale {
        Locale::Arabic => format!(
            "{}\n\nاستخدم المحتوى التالي من خطط الدروس للإجابة على السؤال:\n\n{}\n\n\
             أجب فقط بناءً على هذا المحتوى عند الحديث عن الدرس، ولا تخترع تفاصيل غير موجودة فيه. \
             إذا لم يتضمن المحتوى الإجابة فقل ذلك بوضوح.",
            persona(locale),
            context
        ),
        Locale::English => format!(
            "{}\n\nUse the following content from the lesson plans to answer the question:\n\n{}\n\n\
             When discussing the lesson, answer only from this content and do not invent details \
             that are not in it. If the content does not contain the answer, say so plainly.",
            persona(locale),
            context
        ),
    }
}

fn persona(locale: Locale) -> &'static str {
    match locale {
        Locale::Arabic => {
            "أنت هدايا، مساعد ذكي متخصص في تدريس اللغة العربية.\n\n\
             خصائصك:\n\
             - تقدم نصائح عملية جاهزة للتطبيق في الصف\n\
             - تقترح أنشطة وتمارين مناسبة للفئة العمرية\n\
             - توصي بطرق تقييم مناسبة\n\
             - تركز على احتياجات معلمي اللغة العربية"
        }
        Locale::English => {
            "You are HedAia, an AI teaching assistant specialized in Arabic language education.\n\n\
             Your characteristics:\n\
             - Provide practical, classroom-ready advice\n\
             - Suggest age-appropriate activities and exercises\n\
             - Recommend suitable assessment methods\n\
             - Focus on Arabic teachers' needs"
        }
    }
}

fn general_prompt(locale: Locale) -> &'static str {
    match locale {
        Locale::Arabic => {
            "أنت هدايا، مساعد ذكي متخصص في تدريس اللغة العربية.\n\n\
             أنت متخصص في:\n\
             - التعلم التفاعلي والأساليب الحديثة\n\
             - تقديم نصائح عملية للمعلمين\n\
             - طرق تدريس مبتكرة للأطفال\n\n\
             قدم نصائح عامة مفيدة في تدريس العربية."
        }
        Locale::English => {
            "You are HedAia, an AI assistant specialized in Arabic language teaching.\n\n\
             You specialize in:\n\
             - Interactive learning and modern methodologies\n\
             - Providing practical advice for teachers\n\
             - Innovative teaching methods for children\n\n\
             Provide helpful general advice about Arabic teaching."
        }
    }
}

/// The message shown to the user when no answer could be generated.
pub fn apology(locale: Locale) -> &'static str {
    match locale {
        Locale::Arabic => "عذراً، لم أتمكن من توليد رد الآن. يرجى إعادة إرسال سؤالك.",
        Locale::English => "Sorry, I couldn't generate a response right now. Please send your question again.",
    }
}

/// Orders the messages for the completion call: system prompt, at most
/// `history_turns` prior turns (oldest first), then the query.
///
/// System messages in `history` are ignored.
pub fn build_messages(
    system: String,
    history: &[Message],
    history_turns: usize,
    query: &str,
) -> Vec<Message> {
    let prior: Vec<&Message> = history.iter().filter(|m| m.role != Role::System).collect();
    let skip = prior.len().saturating_sub(history_turns);

    let mut messages = Vec::with_capacity(history_turns.min(prior.len()) + 2);
    messages.push(Message::system(system));
    messages.extend(prior.into_iter().skip(skip).cloned());
    messages.push(Message::user(query));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_context_joins_with_blank_line() {
        let chunks = vec!["first".to_string(), "second".to_string()];
        assert_eq!(assemble_context(&chunks, 1000), "first\n\nsecond");
    }

    #[test]
    fn test_assemble_context_empty() {
        assert_eq!(assemble_context(&[], 1000), "");
    }

    #[test]
    fn test_assemble_context_bounded() {
        let chunks = vec!["أنشطة الدرس".to_string(), "x".repeat(100)];
        let context = assemble_context(&chunks, 20);
        assert!(context.chars().count() <= 20);
        assert!(context.starts_with("أنشطة الدرس\n\n"));
    }

    #[test]
    fn test_empty_context_uses_general_prompt() {
        let prompt = system_prompt("", Locale::English);
        assert!(prompt.contains("general advice"));
        assert!(!prompt.contains("lesson plans to answer"));
    }

    #[test]
    fn test_grounded_prompt_embeds_context_and_instruction() {
        let prompt = system_prompt("Planting trees in the UAE", Locale::English);
        assert!(prompt.contains("Planting trees in the UAE"));
        assert!(prompt.contains("answer only from this content"));

        let arabic = system_prompt("زراعة الأشجار", Locale::Arabic);
        assert!(arabic.contains("زراعة الأشجار"));
    }

    #[test]
    fn test_build_messages_orders_and_bounds_history() {
        let history = vec![
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("a2"),
            Message::user("q3"),
            Message::assistant("a3"),
        ];
        let messages = build_messages("system".into(), &history, 4, "q4");

        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["system", "q2", "a2", "q3", "a3", "q4"]);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages.last().map(|m| m.role), Some(Role::User));
    }

    #[test]
    fn test_build_messages_drops_history_system_messages() {
        let history = vec![Message::system("injected"), Message::user("q1")];
        let messages = build_messages("system".into(), &history, 4, "q2");
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().skip(1).all(|m| m.role != Role::System));
    }
}
