//! Prompt text for the chat model.

use appforge_common::AppMetadata;

pub const CODE_SYSTEM: &str = "\
You write self-contained single-file React components for a mobile mini-app store.

The component is dropped into an existing Vite + React project as src/App.jsx and
rendered by src/main.jsx. Nothing else in the project changes.

Rules:
- Default-export one component named App.
- Import only from \"react\". No other packages, no network calls, no assets.
- Plain JavaScript with JSX, no TypeScript.
- Style with Tailwind utility classes only. Light theme, optimized for a phone screen.
- The app must be fully functional on its own.

Reply with a single JSON object and nothing else:
{\"app_jsx\": \"<complete contents of App.jsx>\"}";

pub const METADATA_SYSTEM: &str = "\
You describe mini apps for a store listing.

Reply with a single JSON object and nothing else:
{
  \"name\": \"short app name\",
  \"description\": \"one or two sentences\",
  \"category\": \"one category, e.g. Health, Design, Productivity, Utilities\",
  \"tags\": [\"exactly\", \"three\", \"tags\"],
  \"app_icon\": \"a single emoji\"
}";

pub fn code_prompt(request: &str) -> String {
    format!("Build this app:\n\n{}", request.trim())
}

pub fn edit_code_prompt(request: &str, prior_code: &str) -> String {
    format!(
        "Here is the current App.jsx:\n\n```jsx\n{}\n```\n\n\
         Apply this change and return the whole updated file:\n\n{}",
        prior_code.trim_end(),
        request.trim()
    )
}

pub fn metadata_prompt(request: &str) -> String {
    format!("Write the store listing for this app:\n\n{}", request.trim())
}

pub fn edit_metadata_prompt(request: &str, prior: &AppMetadata) -> String {
    let current = serde_json::to_string_pretty(prior).unwrap_or_default();
    format!(
        "The app currently has this listing:\n\n{}\n\n\
         It is being changed as follows:\n\n{}\n\n\
         Return the complete listing for the changed app. Keep fields that still fit.",
        current,
        request.trim()
    )
}
