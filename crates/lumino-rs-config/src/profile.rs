//! Model profiles and the per-family defaults table.

use crate::ProfileOverrides;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prompt wire format a family expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptFormat {
    /// `<|im_start|>role ... <|im_end|>` blocks.
    ChatMl,
    /// `<|start_header_id|>role<|end_header_id|>` blocks.
    Llama3,
    /// `User:` / `Assistant:` transcript.
    Plain,
}

/// Model family inferred from the model file name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Coder,
    Llama3,
    Instruct,
    Generic,
}

impl ModelFamily {
    /// Classify a model file name. Matching is case-insensitive and the
    /// first matching rule wins.
    pub fn classify(file_name: &str) -> Self {
        let lowered = file_name.to_lowercase();
        FAMILY_RULES
            .iter()
            .find(|(needle, _)| lowered.contains(needle))
            .map(|(_, family)| *family)
            .unwrap_or(ModelFamily::Generic)
    }

    /// Assistant mode shown to the user.
    pub fn mode(&self) -> &'static str {
        match self {
            ModelFamily::Coder => "coding",
            ModelFamily::Llama3 => "general",
            ModelFamily::Instruct => "reasoning",
            ModelFamily::Generic => "general",
        }
    }

    pub fn prompt_format(&self) -> PromptFormat {
        match self {
            ModelFamily::Coder | ModelFamily::Instruct => PromptFormat::ChatMl,
            ModelFamily::Llama3 => PromptFormat::Llama3,
            ModelFamily::Generic => PromptFormat::Plain,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            ModelFamily::Coder => CODER_SYSTEM_PROMPT,
            ModelFamily::Llama3 => GENERAL_SYSTEM_PROMPT,
            ModelFamily::Instruct => REASONING_SYSTEM_PROMPT,
            ModelFamily::Generic => GENERIC_SYSTEM_PROMPT,
        }
    }

    /// Fixed load-time parameters for the family.
    pub fn init_params(&self) -> InitParams {
        let (n_ctx, rope_freq_base) = match self {
            ModelFamily::Coder | ModelFamily::Instruct => (16384, Some(1_000_000.0)),
            ModelFamily::Llama3 => (8192, Some(500_000.0)),
            ModelFamily::Generic => (4096, None),
        };
        let generic = matches!(self, ModelFamily::Generic);
        InitParams {
            n_ctx,
            n_threads: 8,
            n_gpu_layers: if generic { 0 } else { 99 },
            n_batch: 512,
            use_mlock: !generic,
            use_mmap: true,
            rope_freq_base,
        }
    }

    /// Fixed sampling parameters for the family.
    pub fn generation_params(&self) -> GenerationParams {
        let (max_tokens, temperature, top_p, repeat_penalty, stop): (u32, f32, f32, f32, &[&str]) =
            match self {
                ModelFamily::Coder => (
                    4096,
                    0.6,
                    0.9,
                    1.1,
                    &["<|im_end|>", "<|endoftext|>", "\n\n\n"],
                ),
                ModelFamily::Llama3 => (
                    2048,
                    0.7,
                    0.95,
                    1.15,
                    &[
                        "<|eot_id|>",
                        "<|end_of_text|>",
                        "<|start_header_id|>",
                        "assistant\n\n",
                    ],
                ),
                ModelFamily::Instruct => {
                    (2048, 0.5, 0.9, 1.15, &["<|im_end|>", "<|endoftext|>"])
                }
                ModelFamily::Generic => (1024, 0.7, 0.9, 1.1, &["\nUser:"]),
            };
        GenerationParams {
            max_tokens,
            temperature,
            top_p,
            top_k: 40,
            repeat_penalty,
            stop: stop.iter().map(|s| s.to_string()).collect(),
            echo: false,
        }
    }
}

/// Ordered (substring, family) rules; `Generic` is the fallback.
const FAMILY_RULES: &[(&str, ModelFamily)] = &[
    ("coder", ModelFamily::Coder),
    ("llama-3", ModelFamily::Llama3),
    ("instruct", ModelFamily::Instruct),
];

/// Parameters used when the model is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitParams {
    pub n_ctx: u32,
    pub n_threads: u32,
    pub n_gpu_layers: i32,
    pub n_batch: u32,
    pub use_mlock: bool,
    pub use_mmap: bool,
    pub rope_freq_base: Option<f64>,
}

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    pub stop: Vec<String>,
    /// Echo the prompt back; not forwarded to backends.
    pub echo: bool,
}

/// Resolved parameters and prompt template for one model file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelProfile {
    /// Model file name, used as the selection id.
    pub id: String,
    pub path: PathBuf,
    pub family: ModelFamily,
    pub init: InitParams,
    pub generation: GenerationParams,
    pub system_prompt: String,
    pub prompt_format: PromptFormat,
}

impl ModelProfile {
    /// Build the family-default profile for a model file.
    pub fn for_file(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let id = id.into();
        let family = ModelFamily::classify(&id);
        Self {
            id,
            path: path.into(),
            family,
            init: family.init_params(),
            generation: family.generation_params(),
            system_prompt: family.system_prompt().to_string(),
            prompt_format: family.prompt_format(),
        }
    }

    /// Apply configured overrides on top of the family defaults.
    pub fn with_overrides(mut self, overrides: &ProfileOverrides) -> Self {
        if let Some(n_ctx) = overrides.n_ctx {
            self.init.n_ctx = n_ctx;
        }
        if let Some(n_threads) = overrides.n_threads {
            self.init.n_threads = n_threads;
        }
        if let Some(n_gpu_layers) = overrides.n_gpu_layers {
            self.init.n_gpu_layers = n_gpu_layers;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.generation.max_tokens = max_tokens;
        }
        if let Some(temperature) = overrides.temperature {
            self.generation.temperature = temperature;
        }
        self
    }

    pub fn mode(&self) -> &'static str {
        self.family.mode()
    }
}

const CODER_SYSTEM_PROMPT: &str = r#"You are Lumino, a local intelligence unit specialised in coding and software architecture.

DISPLAY FORMATTING RULES (IMPORTANT FOR THE CLI):
1. MATH AND LOGIC (UNICODE ONLY):
   - This environment is a TERMINAL and CANNOT render LaTeX (such as $$, \frac, \sqrt).
   - Do NOT use LaTeX syntax. Use standard Unicode symbols instead:
     * Square root : '√' (e.g. √25 = 5)
     * Powers      : '²', '³' or '^' (e.g. x² + y²)
     * Fractions   : '/' or '÷' (e.g. 1/2 or 10 ÷ 2)
     * Multiply    : '×' (e.g. 5 × 5)
     * Pi          : 'π'
     * Sum         : '∑'
     * Integral    : '∫'
     * Logic       : '≠', '≈', '≤', '≥'
   - Write complex formulas on a single line with explicit parentheses.
     Example: x = (-b ± √(b² - 4ac)) / 2a

2. QUALITY CODE:
   - Write tidy, modular, clean code.
   - Comment the critical parts.
   - Always use fenced markdown blocks for code:
     ```python
     # code here
     ```

3. DEBUGGING AND ANALYSIS:
   - State the root cause directly.
   - Give a concrete code fix.
   - Point out potential bugs and anti-patterns.

4. COMMUNICATION STYLE:
   - Dense, clear technical language.
   - Get to the point; skip the pleasantries.
"#;

const GENERAL_SYSTEM_PROMPT: &str = r#"You are Lumino, a smart, friendly assistant with broad knowledge.
Your focus is general knowledge, science, history and logical analysis.

FORMATTING RULES (MANDATORY):
1. MATH (UNICODE ONLY):
   - This environment is a TERMINAL.
   - NEVER use LaTeX (such as $$, \frac, \sqrt).
   - Use standard Unicode symbols so the output stays readable:
     * Root: '√' (e.g. √25 = 5)
     * Power: '²' or '^' (e.g. cm², x^2)
     * Multiply: '×' (e.g. 5 × 5)
     * Divide: '/' or '÷'
     * Others: π, ∑, ∫, ≠, ≈
   - Write formulas on a single line.

2. WRITING STYLE:
   - Use clear, plain language.
   - Do not build lists out of em-dashes.
   - Use standard bullets (• or -) or numbering (1., 2.).
   - Organise answers as introduction, main points, then conclusion.

3. PROBLEM SOLVING:
   - For calculations or logic questions:
     * List what is given.
     * State what is asked.
     * Show the solution step by step.
     * Finish with a conclusion.

4. CHARACTER:
   - Educational: explain why the answer holds, not just the result.
   - Objective: present balanced facts.
"#;

const REASONING_SYSTEM_PROMPT: &str = r#"You are Lumino, an expert in quantum physics and mathematics.

FORMATTING RULES (CRUCIAL FOR THE CLI):
1. NEVER use LaTeX block syntax such as:
   - \begin{pmatrix}, \begin{bmatrix}, \frac{}{}
   - The terminal CANNOT display it.

2. USE LINEAR / PYTHON STYLE NOTATION:
   - Matrices: nested arrays [[a, b], [c, d]]
   - Fractions: a slash (1/2, a/b)
   - Roots: the √ symbol or a power of (1/2)

3. QUANTUM PHYSICS:
   - Use Dirac notation with row vectors:
     Example: |0⟩ = [1, 0] and |1⟩ = [0, 1]
   - Pauli operators, written like:
     σ_x = [[0, 1], [1, 0]]
     σ_z = [[1, 0], [0, -1]]

4. LANGUAGE:
   - Explain calculation steps in words when a formula gets too dense.
"#;

const GENERIC_SYSTEM_PROMPT: &str = "You are Lumino, a helpful AI assistant.";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classification_follows_rule_order() {
        assert_eq!(
            ModelFamily::classify("qwen2.5-coder-7b-instruct-q5_k_m.gguf"),
            ModelFamily::Coder
        );
        assert_eq!(
            ModelFamily::classify("Meta-Llama-3.1-8B-Instruct-Q5_K_M.gguf"),
            ModelFamily::Llama3
        );
        assert_eq!(
            ModelFamily::classify("Qwen2.5-7B-Instruct.Q5_1.gguf"),
            ModelFamily::Instruct
        );
        assert_eq!(ModelFamily::classify("phi-2.Q4_0.gguf"), ModelFamily::Generic);
    }

    #[test]
    fn family_defaults_match_table() {
        let coder = ModelProfile::for_file("a-coder.gguf", "/m/a-coder.gguf");
        assert_eq!(coder.prompt_format, PromptFormat::ChatMl);
        assert_eq!(coder.init.n_ctx, 16384);
        assert_eq!(coder.generation.max_tokens, 4096);
        assert_eq!(
            coder.generation.stop,
            vec!["<|im_end|>", "<|endoftext|>", "\n\n\n"]
        );
        assert_eq!(coder.mode(), "coding");

        let llama = ModelProfile::for_file("llama-3-8b.gguf", "/m/llama-3-8b.gguf");
        assert_eq!(llama.prompt_format, PromptFormat::Llama3);
        assert_eq!(llama.init.rope_freq_base, Some(500_000.0));
        assert_eq!(llama.generation.top_p, 0.95);
        assert_eq!(llama.generation.stop.len(), 4);

        let generic = ModelProfile::for_file("tiny.gguf", "/m/tiny.gguf");
        assert_eq!(generic.prompt_format, PromptFormat::Plain);
        assert_eq!(generic.init.n_gpu_layers, 0);
        assert!(!generic.init.use_mlock);
        assert_eq!(generic.init.rope_freq_base, None);
        assert_eq!(generic.generation.stop, vec!["\nUser:"]);
        assert_eq!(generic.system_prompt, GENERIC_SYSTEM_PROMPT);
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let overrides = ProfileOverrides {
            n_ctx: Some(2048),
            temperature: Some(0.1),
            ..ProfileOverrides::default()
        };
        let profile = ModelProfile::for_file("x-instruct.gguf", "/m/x-instruct.gguf")
            .with_overrides(&overrides);
        assert_eq!(profile.init.n_ctx, 2048);
        assert_eq!(profile.generation.temperature, 0.1);
        assert_eq!(profile.generation.max_tokens, 2048);
        assert_eq!(profile.init.n_threads, 8);
    }
}
