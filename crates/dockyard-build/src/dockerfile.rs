use crate::spec::{ArtifactSpec, CopySource, MirrorConfig, Stage, StageRole, Step};

/// Renders a validated [`ArtifactSpec`] as a multi-stage Dockerfile.
pub struct DockerfileGenerator<'a> {
    spec: &'a ArtifactSpec,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(spec: &'a ArtifactSpec) -> Self {
        Self { spec }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, stage) in self.spec.stages.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            render_stage(&mut out, index + 1, stage);
        }
        out
    }
}

fn render_stage(out: &mut String, number: usize, stage: &Stage) {
    let role = match stage.role {
        StageRole::Build => "build: toolchain + dependency resolution",
        StageRole::Runtime => "runtime",
    };
    out.push_str(&format!(
        "# === Stage {number}: {} ({role}) ===\nFROM {} AS {}\n",
        stage.name, stage.base_image, stage.name
    ));

    for step in &stage.steps {
        render_step(out, step);
    }
}

fn render_step(out: &mut String, step: &Step) {
    let line = match step {
        Step::Mirror(mirror) => mirror_lines(mirror),
        Step::Install(install) => format!(
            "RUN apt-get update && apt-get install -y --no-install-recommends {} && rm -rf /var/lib/apt/lists/*",
            install.packages.join(" ")
        ),
        Step::Resolve(resolve) => format!(
            "RUN PYTHONUSERBASE={} pip install --user --no-cache-dir -r {}",
            shell_word(&resolve.bundle_dir),
            shell_word(&resolve.manifest)
        ),
        Step::Workdir { path } => format!("WORKDIR {path}"),
        Step::Copy(op) => {
            let from = match &op.from {
                CopySource::Host => String::new(),
                CopySource::Stage(stage) => format!("--from={stage} "),
            };
            if needs_quoting(&op.src) || needs_quoting(&op.dest) {
                format!("COPY {from}{}", exec_form(&[op.src.clone(), op.dest.clone()]))
            } else {
                format!("COPY {from}{} {}", op.src, op.dest)
            }
        }
        Step::MakeDirs { paths } => {
            let words: Vec<String> = paths.iter().map(|p| shell_word(p)).collect();
            format!("RUN mkdir -p {}", words.join(" "))
        }
        Step::Env { key, value } => format!("ENV {key}={}", env_value(value)),
        Step::Expose { port } => format!("EXPOSE {port}"),
        Step::Cmd { argv } => format!("CMD {}", exec_form(argv)),
    };
    if !line.is_empty() {
        out.push_str(&line);
        out.push('\n');
    }
}

fn mirror_lines(mirror: &MirrorConfig) -> String {
    if mirror.is_empty() {
        return String::new();
    }
    let mut lines = Vec::new();
    if let Some(host) = &mirror.apt_mirror {
        lines.push(format!(
            "RUN if [ -f /etc/apt/sources.list.d/debian.sources ]; then \
             sed -i 's|deb.debian.org|{host}|g' /etc/apt/sources.list.d/debian.sources; \
             else sed -i 's|deb.debian.org|{host}|g' /etc/apt/sources.list; fi"
        ));
    }
    if let Some(url) = &mirror.pip_index_url {
        lines.push(format!("ENV PIP_INDEX_URL={}", env_value(url)));
    }
    lines.join("\n")
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'))
}

/// `ENV` value, double-quoted when the bare `key=value` form would split it.
///
/// `$` is left alone so `$PATH` still expands.
fn env_value(value: &str) -> String {
    if needs_quoting(value) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_owned()
    }
}

/// Single shell word for a `RUN` line.
fn shell_word(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | '=' | '@' | ','));
    if !plain {
        format!("'{}'", value.replace('\'', "'\\''"))
    } else {
        value.to_owned()
    }
}

/// JSON-array ("exec form") rendering of a command.
fn exec_form(argv: &[String]) -> String {
    let quoted: Vec<String> = argv
        .iter()
        .map(|arg| format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("[{}]", quoted.join(", "))
}
