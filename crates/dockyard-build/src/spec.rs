//! Build Artifact Spec: the ordered stage list an image is assembled from.
//!
//! A spec is built once from configuration ([`ArtifactSpec::from_config`]),
//! checked with [`ArtifactSpec::validate`], and then only read. Validation
//! runs before any stage executes, so every [`SpecError`] is a definition
//! error.

use std::collections::HashSet;
use std::path::{Component, Path};

use dockyard_core::{AppProject, DockyardConfig};
use serde::Serialize;

/// Name of the stage that carries the toolchain and resolves dependencies.
pub const BUILD_STAGE: &str = "builder";

/// Name of the final, minimal stage.
pub const RUNTIME_STAGE: &str = "runtime";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSpec {
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    Build,
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: String,
    pub base_image: String,
    pub role: StageRole,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Package-source configuration; identical across stages.
    Mirror(MirrorConfig),
    /// System toolchain packages. Nothing installed here is copyable.
    Install(SystemInstall),
    /// Manifest resolution into a self-contained, copyable bundle directory.
    Resolve(Resolve),
    Workdir { path: String },
    Copy(CopyOp),
    /// Empty directories the application writes to at runtime.
    MakeDirs { paths: Vec<String> },
    Env { key: String, value: String },
    /// Informational port metadata.
    Expose { port: u16 },
    /// Startup command in exec form.
    Cmd { argv: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorConfig {
    pub pip_index_url: Option<String>,
    pub apt_mirror: Option<String>,
}

impl MirrorConfig {
    pub fn is_empty(&self) -> bool {
        self.pip_index_url.is_none() && self.apt_mirror.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInstall {
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolve {
    pub manifest: String,
    pub bundle_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOp {
    pub from: CopySource,
    pub src: String,
    pub dest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopySource {
    Host,
    Stage(String),
}

impl ArtifactSpec {
    /// Build the standard two-stage spec for `project`.
    ///
    /// ```text
    /// builder  mirror → toolchain → manifest → resolve into bundle_dir
    /// runtime  mirror → bundle_dir (from builder) → app tree → runtime dirs
    ///          → PATH / PYTHONPATH → EXPOSE → CMD
    /// ```
    pub fn from_config(config: &DockyardConfig, project: &AppProject) -> Self {
        let build = &config.build;
        let app = &config.app;
        let mirror = MirrorConfig {
            pip_index_url: build.pip_index_url.clone(),
            apt_mirror: build.apt_mirror.clone(),
        };

        let mut builder_steps = vec![Step::Mirror(mirror.clone())];
        if !build.toolchain_packages.is_empty() {
            builder_steps.push(Step::Install(SystemInstall {
                packages: build.toolchain_packages.clone(),
            }));
        }
        builder_steps.extend([
            Step::Workdir {
                path: app.workdir.clone(),
            },
            Step::Copy(CopyOp {
                from: CopySource::Host,
                src: project.manifest.clone(),
                dest: project.manifest.clone(),
            }),
            Step::Resolve(Resolve {
                manifest: project.manifest.clone(),
                bundle_dir: build.bundle_dir.clone(),
            }),
        ]);

        let mut runtime_steps = vec![
            Step::Mirror(mirror),
            Step::Workdir {
                path: app.workdir.clone(),
            },
            Step::Copy(CopyOp {
                from: CopySource::Stage(BUILD_STAGE.to_owned()),
                src: build.bundle_dir.clone(),
                dest: build.bundle_dir.clone(),
            }),
        ];

        match &build.include {
            None => runtime_steps.push(Step::Copy(CopyOp {
                from: CopySource::Host,
                src: ".".to_owned(),
                dest: ".".to_owned(),
            })),
            Some(paths) => {
                // The entry point always ships, even when not listed.
                let mut sources: Vec<&str> = paths.iter().map(String::as_str).collect();
                if !paths.iter().any(|p| covers(p, &project.entry_point)) {
                    sources.push(&project.entry_point);
                }
                runtime_steps.extend(sources.into_iter().map(|src| {
                    Step::Copy(CopyOp {
                        from: CopySource::Host,
                        src: src.to_owned(),
                        dest: format!("./{src}"),
                    })
                }));
            }
        }

        if !build.runtime_dirs.is_empty() {
            runtime_steps.push(Step::MakeDirs {
                paths: build.runtime_dirs.clone(),
            });
        }

        runtime_steps.extend([
            Step::Env {
                key: "PYTHONUSERBASE".to_owned(),
                value: build.bundle_dir.clone(),
            },
            Step::Env {
                key: "PATH".to_owned(),
                value: format!("{}/bin:$PATH", build.bundle_dir.trim_end_matches('/')),
            },
            Step::Env {
                key: "PYTHONPATH".to_owned(),
                value: app.workdir.clone(),
            },
        ]);

        let mut extra_env: Vec<_> = build.env.iter().collect();
        extra_env.sort();
        runtime_steps.extend(extra_env.into_iter().map(|(k, v)| Step::Env {
            key: k.clone(),
            value: v.clone(),
        }));

        runtime_steps.extend([
            Step::Expose { port: app.port },
            Step::Cmd {
                argv: vec![app.interpreter.clone(), project.entry_point.clone()],
            },
        ]);

        Self {
            stages: vec![
                Stage {
                    name: BUILD_STAGE.to_owned(),
                    base_image: build.base_image.clone(),
                    role: StageRole::Build,
                    steps: builder_steps,
                },
                Stage {
                    name: RUNTIME_STAGE.to_owned(),
                    base_image: build.runtime_image.clone(),
                    role: StageRole::Runtime,
                    steps: runtime_steps,
                },
            ],
        }
    }

    /// The final stage, if the spec has any stages.
    pub fn runtime(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpecError`] found, scanning stages in order.
    pub fn validate(&self) -> Result<(), SpecError> {
        let Some(last) = self.stages.last() else {
            return Err(SpecError::NoStages);
        };
        if last.role != StageRole::Runtime {
            return Err(SpecError::RuntimeNotLast(last.name.clone()));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let first_mirror = self.stages[0].mirror();

        for (index, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() || stage.base_image.trim().is_empty() {
                return Err(SpecError::IncompleteStage { index });
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(SpecError::DuplicateStage(stage.name.clone()));
            }
            if stage.role == StageRole::Runtime && index != self.stages.len() - 1 {
                return Err(SpecError::ExtraRuntime(stage.name.clone()));
            }
            if stage.mirror() != first_mirror {
                return Err(SpecError::MirrorMismatch {
                    stage: stage.name.clone(),
                    first: self.stages[0].name.clone(),
                });
            }

            for step in &stage.steps {
                match step {
                    Step::Install(_) | Step::Resolve(_) if stage.role == StageRole::Runtime => {
                        return Err(SpecError::ToolchainInRuntime {
                            stage: stage.name.clone(),
                        });
                    }
                    Step::Copy(op) => self.check_copy(index, stage, op)?,
                    _ => {}
                }
            }
        }

        last.check_entry()
    }

    fn check_copy(&self, index: usize, stage: &Stage, op: &CopyOp) -> Result<(), SpecError> {
        if op.from == CopySource::Host
            && let Some(reason) = unsafe_relative(&op.src)
        {
            return Err(SpecError::InvalidHostPath {
                stage: stage.name.clone(),
                path: op.src.clone(),
                reason,
            });
        }

        let CopySource::Stage(from) = &op.from else {
            return Ok(());
        };

        let Some(source_index) = self.stages.iter().position(|s| &s.name == from) else {
            return Err(SpecError::UnknownSource {
                stage: stage.name.clone(),
                from: from.clone(),
            });
        };
        if source_index >= index {
            return Err(SpecError::ForwardReference {
                stage: stage.name.clone(),
                from: from.clone(),
            });
        }

        let produced = self.stages[source_index].produced();
        let src = Path::new(&op.src);
        let has_parent = src.components().any(|c| matches!(c, Component::ParentDir));
        if has_parent || !produced.iter().any(|p| src.starts_with(p)) {
            return Err(SpecError::NotProduced {
                stage: stage.name.clone(),
                from: from.clone(),
                path: op.src.clone(),
                produced: produced.iter().map(|p| (*p).to_owned()).collect(),
            });
        }
        Ok(())
    }
}

impl Stage {
    /// Bundle directories this stage's resolution steps produce.
    pub fn produced(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Resolve(r) => Some(r.bundle_dir.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The stage's mirror configuration; a stage without one has the empty config.
    pub fn mirror(&self) -> MirrorConfig {
        self.steps
            .iter()
            .find_map(|step| match step {
                Step::Mirror(m) => Some(m.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn check_entry(&self) -> Result<(), SpecError> {
        let commands: Vec<&Vec<String>> = self
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Cmd { argv } => Some(argv),
                _ => None,
            })
            .collect();
        if commands.len() != 1 {
            return Err(SpecError::EntryPoint {
                stage: self.name.clone(),
                count: commands.len(),
            });
        }
        if commands[0].is_empty() || commands[0].iter().any(|a| a.trim().is_empty()) {
            return Err(SpecError::EmptyCommand {
                stage: self.name.clone(),
            });
        }

        let ports: Vec<u16> = self
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Expose { port } => Some(*port),
                _ => None,
            })
            .collect();
        match ports.as_slice() {
            [0] => Err(SpecError::ZeroPort {
                stage: self.name.clone(),
            }),
            [_] => Ok(()),
            _ => Err(SpecError::Port {
                stage: self.name.clone(),
                count: ports.len(),
            }),
        }
    }
}

/// Whether include entry `include` already carries `path`.
fn covers(include: &str, path: &str) -> bool {
    let include = include.trim_start_matches("./");
    let path = path.trim_start_matches("./");
    include == "." || Path::new(path).starts_with(include)
}

fn unsafe_relative(path: &str) -> Option<&'static str> {
    let parsed = Path::new(path);
    if path.trim().is_empty() {
        Some("path is empty")
    } else if parsed.is_absolute() {
        Some("absolute host paths are not allowed")
    } else if parsed
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        Some("parent directory components are not allowed")
    } else {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("artifact spec has no stages")]
    NoStages,

    #[error("stage #{index} has an empty name or base image")]
    IncompleteStage { index: usize },

    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),

    #[error("the last stage must be a runtime stage, found build stage '{0}'")]
    RuntimeNotLast(String),

    #[error("runtime stage '{0}' must be the last stage")]
    ExtraRuntime(String),

    #[error("stage '{stage}' copies from unknown stage '{from}'")]
    UnknownSource { stage: String, from: String },

    #[error("stage '{stage}' copies from '{from}', which does not run before it")]
    ForwardReference { stage: String, from: String },

    #[error(
        "stage '{stage}' copies {path} from '{from}', which only produces: {}",
        format_produced(produced)
    )]
    NotProduced {
        stage: String,
        from: String,
        path: String,
        produced: Vec<String>,
    },

    #[error("runtime stage '{stage}' must not install or resolve packages")]
    ToolchainInRuntime { stage: String },

    #[error("stage '{stage}' copies host path {path:?}: {reason}")]
    InvalidHostPath {
        stage: String,
        path: String,
        reason: &'static str,
    },

    #[error("stage '{stage}' uses a package mirror configuration different from stage '{first}'")]
    MirrorMismatch { stage: String, first: String },

    #[error("runtime stage '{stage}' must declare exactly one startup command, found {count}")]
    EntryPoint { stage: String, count: usize },

    #[error("runtime stage '{stage}' has an empty startup command")]
    EmptyCommand { stage: String },

    #[error("runtime stage '{stage}' must declare exactly one port, found {count}")]
    Port { stage: String, count: usize },

    #[error("runtime stage '{stage}' declares port 0")]
    ZeroPort { stage: String },
}

fn format_produced(produced: &[String]) -> String {
    if produced.is_empty() {
        "(nothing)".to_owned()
    } else {
        produced.join(", ")
    }
}
