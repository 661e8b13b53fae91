//! Prompt rendering for each supported prompt format.

use lumino_rs_config::PromptFormat;
use lumino_rs_protocol::{Role, Turn};

/// Renders a system prompt and conversation into a raw completion prompt.
pub trait ChatTemplate {
    /// Marker that opens the assistant turn the model should complete.
    fn assistant_open(&self) -> &'static str;

    /// Wrap one role-tagged block.
    fn block(&self, role: &str, content: &str) -> String;

    /// Text emitted before the first block.
    fn preamble(&self) -> &'static str {
        ""
    }

    /// Render the full prompt, ending with the assistant-open marker.
    ///
    /// An empty system prompt omits the system block. No truncation is done.
    fn format(&self, system_prompt: &str, turns: &[Turn]) -> String {
        let mut prompt = String::from(self.preamble());
        let system_prompt = system_prompt.trim();
        if !system_prompt.is_empty() {
            prompt.push_str(&self.block("system", system_prompt));
        }
        for turn in turns {
            prompt.push_str(&self.block(turn.role.as_str(), &turn.content));
        }
        prompt.push_str(self.assistant_open());
        prompt
    }
}

impl ChatTemplate for PromptFormat {
    fn assistant_open(&self) -> &'static str {
        match self {
            PromptFormat::ChatMl => "<|im_start|>assistant\n",
            PromptFormat::Llama3 => "<|start_header_id|>assistant<|end_header_id|>\n\n",
            PromptFormat::Plain => "Assistant:",
        }
    }

    fn block(&self, role: &str, content: &str) -> String {
        match self {
            PromptFormat::ChatMl => format!("<|im_start|>{role}\n{content}<|im_end|>\n"),
            PromptFormat::Llama3 => {
                format!("<|start_header_id|>{role}<|end_header_id|>\n\n{content}<|eot_id|>")
            }
            PromptFormat::Plain => format!("{}: {content}\n\n", plain_label(role)),
        }
    }

    fn preamble(&self) -> &'static str {
        match self {
            PromptFormat::Llama3 => "<|begin_of_text|>",
            PromptFormat::ChatMl | PromptFormat::Plain => "",
        }
    }
}

fn plain_label(role: &str) -> &str {
    match role {
        "system" => "System",
        r if r == Role::User.as_str() => "User",
        r if r == Role::Assistant.as_str() => "Assistant",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn exchange() -> Vec<Turn> {
        vec![
            Turn::user("hi"),
            Turn::assistant("hello"),
            Turn::user("how are you?"),
        ]
    }

    #[test]
    fn chatml_layout() {
        let prompt = PromptFormat::ChatMl.format("Be brief.", &exchange());
        assert_eq!(
            prompt,
            "<|im_start|>system\nBe brief.<|im_end|>\n\
             <|im_start|>user\nhi<|im_end|>\n\
             <|im_start|>assistant\nhello<|im_end|>\n\
             <|im_start|>user\nhow are you?<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn llama3_layout() {
        let prompt = PromptFormat::Llama3.format("sys", &[Turn::user("q")]);
        assert_eq!(
            prompt,
            "<|begin_of_text|>\
             <|start_header_id|>system<|end_header_id|>\n\nsys<|eot_id|>\
             <|start_header_id|>user<|end_header_id|>\n\nq<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>\n\n"
        );
    }

    #[test]
    fn plain_layout_without_system_prompt() {
        let prompt = PromptFormat::Plain.format("   ", &exchange());
        assert_eq!(
            prompt,
            "User: hi\n\nAssistant: hello\n\nUser: how are you?\n\nAssistant:"
        );
    }

    #[test]
    fn every_turn_appears_once_in_order() {
        let turns: Vec<Turn> = (0..6)
            .map(|idx| {
                if idx % 2 == 0 {
                    Turn::user(format!("u{idx}"))
                } else {
                    Turn::assistant(format!("a{idx}"))
                }
            })
            .collect();
        for format in [PromptFormat::ChatMl, PromptFormat::Llama3, PromptFormat::Plain] {
            let prompt = format.format("", &turns);
            let mut cursor = 0;
            for turn in &turns {
                let block = format.block(turn.role.as_str(), &turn.content);
                let found = prompt[cursor..].find(&block).expect("block present");
                cursor += found + block.len();
            }
            assert_eq!(&prompt[cursor..], format.assistant_open());
        }
    }
}
