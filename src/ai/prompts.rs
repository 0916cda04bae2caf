//! Prompt builders for the generation endpoints.
//!
//! Every prompt asks for JSON back; `parse::extract_json` copes with the
//! fenced or prose-wrapped replies models actually produce.

use crate::models::question::{QuestionDraft, QuestionWithOptions};
use crate::models::quiz::Quiz;
use crate::models::response::ResponseWithAnswers;

/// Prompt for generating a whole quiz draft about a topic.
pub fn quiz_prompt(topic: &str, num_questions: u32) -> String {
    format!(
        "Generate a survey about {topic} with {num_questions} questions and 4 options each. \
         Each option should have a 'points' field (integer, can be 0 or more). \
         Return the result as a JSON object with this structure: {{\n  \
         \"title\": \"Quiz Title\",\n  \"description\": \"Quiz Description\",\n  \
         \"questions\": [ {{ \"text\": \"Question?\", \"marks\": 1, \
         \"options\": [ {{ \"text\": \"Option 1\", \"points\": 2 }}, \
         {{ \"text\": \"Option 2\", \"points\": 0 }} ] }} ] }}"
    )
}

/// Prompt for extending an in-progress draft with additional questions,
/// giving the model the existing ones so it does not repeat them.
pub fn extend_questions_prompt(
    title: &str,
    description: &str,
    questions: &[QuestionDraft],
    count: u32,
) -> String {
    format!(
        "You are an expert quiz generator. Given the following quiz context, generate {count} \
         new, non-redundant questions (with 4 options each, each option with a 'points' field). \
         Do NOT repeat or closely paraphrase any existing question.\n\n\
         Quiz Title: {title}\nDescription: {description}\n\n\
         Existing Questions:\n{existing}\n\n\
         Return ONLY the new questions as a JSON array: \
         [ {{ \"text\": \"Question?\", \"marks\": 1, \
         \"options\": [ {{ \"text\": \"Option 1\", \"points\": 2 }}, \
         {{ \"text\": \"Option 2\", \"points\": 0 }} ] }} ]",
        existing = format_draft_questions(questions),
    )
}

/// Prompt summarizing a quiz's collected responses for the owner dashboard.
pub fn analysis_prompt(
    quiz: &Quiz,
    questions: &[QuestionWithOptions],
    responses: &[ResponseWithAnswers],
) -> String {
    let listed = responses
        .iter()
        .map(|r| {
            format!(
                "Respondent: {}\n{}",
                r.response.respondent_name.as_deref().unwrap_or("Anonymous"),
                format_selected_answers(questions, r),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Analyze the following survey results and provide a summary with insights.\n\n\
         Quiz Title: {title}\nDescription: {description}\n\n\
         Questions and Options:\n{questions}\n\n\
         Responses:\n{responses}\n\n{sections}",
        title = quiz.title,
        description = quiz.description,
        questions = format_questions(questions),
        responses = listed,
        sections = SECTIONS_INSTRUCTION,
    )
}

/// Prompt producing personalized advice for a single scored response.
pub fn advice_prompt(
    quiz: &Quiz,
    questions: &[QuestionWithOptions],
    response: &ResponseWithAnswers,
) -> String {
    format!(
        "You are an expert advisor. Analyze the following quiz result and provide a \
         personalized summary or advice.\n\n\
         Quiz Title: {title}\nDescription: {description}\n\n\
         Questions and Options:\n{questions}\n\n\
         User's Answers:\n{answers}\n\n{sections}",
        title = quiz.title,
        description = quiz.description,
        questions = format_questions(questions),
        answers = format_selected_answers(questions, response),
        sections = SECTIONS_INSTRUCTION,
    )
}

const SECTIONS_INSTRUCTION: &str = "Return your analysis as a JSON array of sections, each with \
    a 'title' and a 'description' field. Each section should be suitable for display as a card \
    in a dashboard. Example: [{\"title\":\"Section Title\",\"description\":\"...\"}]";

fn format_questions(questions: &[QuestionWithOptions]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let options = q
                .options
                .iter()
                .enumerate()
                .map(|(j, opt)| format!("  Option {}: {} (Points: {})", j + 1, opt.text, opt.points))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Q{}: {}\n{}", i + 1, q.text, options)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_draft_questions(questions: &[QuestionDraft]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let options = q
                .options
                .iter()
                .enumerate()
                .map(|(j, opt)| format!("  Option {}: {} (Points: {})", j + 1, opt.text, opt.points))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Q{}: {}\n{}", i + 1, q.text, options)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One "Qn: <option text> (Points: n)" line per question, "No answer" for
/// questions the response skipped.
fn format_selected_answers(questions: &[QuestionWithOptions], response: &ResponseWithAnswers) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let selected = response
                .answers
                .iter()
                .find(|a| a.question_id == q.id)
                .and_then(|a| q.options.iter().find(|o| o.id == a.option_id));
            match selected {
                Some(opt) => format!("Q{}: {} (Points: {})", i + 1, opt.text, opt.points),
                None => format!("Q{}: No answer", i + 1),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
