//! Prompt construction for planning, step assessment, repair, and the
//! consolidated summary.

/// Default schema handed to the planner and to the repair model when a plan
/// fails strict decoding.
pub const PLAN_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["steps"],
  "properties": {
    "steps": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["name", "description"],
        "properties": {
          "name": { "type": "string" },
          "description": { "type": "string" },
          "tools": {
            "type": "array",
            "items": {
              "type": "object",
              "required": ["tool"],
              "properties": {
                "tool": { "type": "string" },
                "args": { "type": "object" }
              }
            }
          }
        }
      }
    }
  }
}"#;

/// Step-assessment template. Placeholders are substituted by [`render`],
/// which accepts both `{key}` and `{{key}}` spellings.
const REVIEW_TEMPLATE: &str = "\
You are a senior engineer reviewing one step of a pull request in {repo_name}.

Step under review: {brief_change_summary}

Diff:
{diff_or_code_block}

Tool outputs:
{tool_outputs}

Report your findings for this step as a single JSON object with the fields
\"findings\" (array of strings) and \"verdict\" (one of \"pass\", \"warn\", \"fail\").
Output only JSON.
";

/// Substitute `{key}` / `{{key}}` placeholders in a template.
pub fn render(template: &str, placeholders: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in placeholders {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

pub fn plan_prompt(
    repo_url: &str,
    pr_number: u64,
    plan_schema: &str,
    tool_catalog: &str,
    file_path: &str,
    diff: &str,
) -> String {
    format!(
        "Your task today is Code Review. You are given PR #{pr_number} to review from the repo '{repo_url}'.\n\
         You have to first come up with a plan to review the code changes in the PR as a series of steps.\n\
         Write the plan as per the following step schema: {plan_schema}\n\
         Make sure to follow the step schema format exactly and output only JSON.\n\
         Here is the file diff for {file_path}:\n{diff}\n\
         You have access to the following tools to help you with your code review: {tool_catalog}\n"
    )
}

pub fn step_prompt(repo_url: &str, description: &str, diff: &str, tool_outputs: &str) -> String {
    render(
        REVIEW_TEMPLATE,
        &[
            ("repo_name", repo_url),
            ("brief_change_summary", description),
            ("diff_or_code_block", diff),
            ("tool_outputs", tool_outputs),
        ],
    )
}

pub fn repair_prompt(schema_hint: &str, raw: &str) -> String {
    let schema_clause = if schema_hint.is_empty() {
        String::new()
    } else {
        format!("It must conform to this schema: {schema_hint}\n")
    };
    format!(
        "The following text was supposed to be valid JSON but failed to parse.\n\
         {schema_clause}\
         Rewrite it as strictly valid JSON preserving the content. Output only JSON.\n\n\
         Offending text:\n{raw}\n"
    )
}

pub fn summary_prompt(repo_url: &str, pr_number: u64, aggregate: &str) -> String {
    format!(
        "You are a Principal Software Engineer.\n\
         Review the following code review results for PR #{pr_number} in {repo_url}.\n\n\
         Aggregated Reviews:\n{aggregate}\n\n\
         Please provide a concise Executive Summary of the PR.\n\
         1. Highlight the most critical issues found across all files.\n\
         2. Identify any recurring patterns or code quality concerns.\n\
         3. Provide a final recommendation (Merge, Request Changes, etc.).\n"
    )
}
