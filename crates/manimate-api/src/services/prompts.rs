//! Prompt construction for the planning and code-generation stages.

use manimate_models::ScenePlan;

/// System message for the planning call.
pub const PLANNER_SYSTEM: &str = "You are a scene planner for a Manim animation. \
Respond with ONLY a strict JSON object, no Markdown, matching: \
{\"sceneName\": string, \"objects\": [string], \"actions\": [string], \
\"narration\": string, \"captions\": [{\"text\": string, \"startTime\": number, \"duration\": number}]}. \
sceneName must be a valid Python class name.";

/// System message for the code-generation call.
pub const CODER_SYSTEM: &str = "You are a Manim developer. Respond with ONLY a strict \
JSON object, no Markdown, matching: {\"sceneName\": string, \"sourceCode\": string}. \
sourceCode must be a complete Manim script defining exactly one Scene class named sceneName.";

/// Initial user prompt for scene planning.
pub fn planning_prompt(description: &str, language: Option<&str>) -> String {
    let language = language.unwrap_or("english");
    format!(
        "Plan a short animated scene explaining the following topic.\n\
         Topic: {description}\n\
         Narration language: {language}\n\
         Keep the scene under 30 seconds and the narration concise."
    )
}

/// Initial user prompt for code generation, carrying any repair context.
pub fn codegen_prompt(plan: &ScenePlan) -> String {
    let mut prompt = format!(
        "Write a Manim script for this scene plan.\n\
         Scene class name: {}\n\
         Objects: {}\n\
         Actions: {}\n\
         Narration (for pacing only): {}",
        plan.scene_name,
        plan.objects.join("; "),
        plan.actions.join("; "),
        plan.narration,
    );

    if let Some(code) = &plan.previous_code {
        prompt.push_str("\n\nThe previous attempt failed. Previous code:\n");
        prompt.push_str(code);
    }
    if let Some(error) = &plan.manim_error {
        prompt.push_str("\n\nRenderer error output:\n");
        prompt.push_str(error);
    }
    if plan.video_not_found {
        prompt.push_str("\n\nThe renderer exited but produced no video file.");
    }

    prompt
}
