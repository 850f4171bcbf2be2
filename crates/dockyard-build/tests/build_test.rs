use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use dockyard_build::bundle::{BundleError, create_bundle, is_dirty};
use dockyard_build::dockerfile::DockerfileGenerator;
use dockyard_build::spec::ArtifactSpec;
use dockyard_core::{AppProject, DockyardConfig};
use tempfile::TempDir;

fn default_project() -> AppProject {
    AppProject {
        name: "stock-analyzer".to_owned(),
        root: PathBuf::from("/tmp/stock-analyzer"),
        manifest: "requirements.txt".to_owned(),
        entry_point: "start_app.py".to_owned(),
        image: "stock-analyzer:latest".to_owned(),
    }
}

fn render(config: &DockyardConfig) -> String {
    let spec = ArtifactSpec::from_config(config, &default_project());
    spec.validate().unwrap();
    DockerfileGenerator::new(&spec).render()
}

fn runtime_section(output: &str) -> &str {
    output.split("Stage 2: runtime").nth(1).unwrap()
}

fn build_section(output: &str) -> &str {
    output.split("Stage 2: runtime").next().unwrap()
}

fn git(dir: &Path, args: &[&str]) {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
}

/// Initialize a git repo with a minimal application and an initial commit.
fn init_git_project(dir: &Path) {
    std::fs::create_dir_all(dir.join("stock_select")).unwrap();
    std::fs::write(dir.join("requirements.txt"), "flask\nredis\n").unwrap();
    std::fs::write(dir.join("start_app.py"), "print('start')\n").unwrap();
    std::fs::write(dir.join("stock_select/__init__.py"), "").unwrap();
    commit_all(dir);
}

fn commit_all(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "init"]);
}

// ── Dockerfile Generation Tests ──

#[test]
fn dockerfile_has_build_and_runtime_stages() {
    let output = render(&DockyardConfig::default());

    assert!(output.contains("Stage 1: builder"));
    assert!(output.contains("Stage 2: runtime"));
    assert!(output.contains("FROM python:3.11-slim AS builder"));
    assert!(output.contains("FROM python:3.11-slim AS runtime"));
}

#[test]
fn build_stage_installs_toolchain_and_resolves_into_user_bundle() {
    let output = render(&DockyardConfig::default());
    let build = build_section(&output);

    assert!(build.contains("apt-get install -y --no-install-recommends gcc"));
    assert!(build.contains("COPY requirements.txt requirements.txt"));
    assert!(
        build.contains("RUN PYTHONUSERBASE=/root/.local pip install --user --no-cache-dir -r requirements.txt")
    );
}

#[test]
fn runtime_stage_copies_only_bundle_from_builder() {
    let output = render(&DockyardConfig::default());
    let runtime = runtime_section(&output);

    let from_builder: Vec<&str> = runtime
        .lines()
        .filter(|l| l.starts_with("COPY --from="))
        .collect();
    assert_eq!(
        from_builder,
        vec!["COPY --from=builder /root/.local /root/.local"]
    );
    assert!(!runtime.contains("apt-get"));
    assert!(!runtime.contains("gcc"));
    assert!(!runtime.contains("pip install"));
}

#[test]
fn runtime_stage_sets_environment_and_entry_point() {
    let output = render(&DockyardConfig::default());
    let runtime = runtime_section(&output);

    assert!(runtime.contains("WORKDIR /app"));
    assert!(runtime.contains("COPY . ."));
    assert!(runtime.contains("RUN mkdir -p data logs"));
    assert!(runtime.contains("ENV PATH=/root/.local/bin:$PATH"));
    assert!(runtime.contains("ENV PYTHONPATH=/app"));
    assert!(runtime.contains("EXPOSE 8888"));
    assert!(runtime.trim_end().ends_with(r#"CMD ["python", "start_app.py"]"#));
}

#[test]
fn dockerfile_uses_configured_images() {
    let mut config = DockyardConfig::default();
    config.build.base_image = "python:3.12".to_owned();
    config.build.runtime_image = "python:3.12-slim".to_owned();

    let output = render(&config);

    assert!(output.contains("FROM python:3.12 AS builder"));
    assert!(output.contains("FROM python:3.12-slim AS runtime"));
}

#[test]
fn dockerfile_exposes_custom_port() {
    let mut config = DockyardConfig::default();
    config.app.port = 5000;

    let output = render(&config);

    assert!(output.contains("EXPOSE 5000"));
    assert!(!output.contains("EXPOSE 8888"));
}

#[test]
fn dockerfile_no_toolchain_install_when_empty() {
    let mut config = DockyardConfig::default();
    config.build.toolchain_packages.clear();

    let output = render(&config);

    assert!(!output.contains("apt-get install"));
}

#[test]
fn mirror_applies_to_every_stage() {
    let mut config = DockyardConfig::default();
    config.build.pip_index_url = Some("https://pypi.tuna.tsinghua.edu.cn/simple".to_owned());
    config.build.apt_mirror = Some("mirrors.aliyun.com".to_owned());

    let output = render(&config);

    for section in [build_section(&output), runtime_section(&output)] {
        assert!(section.contains("ENV PIP_INDEX_URL=https://pypi.tuna.tsinghua.edu.cn/simple"));
        assert!(section.contains("s|deb.debian.org|mirrors.aliyun.com|g"));
    }
}

#[test]
fn mirror_precedes_toolchain_install() {
    let mut config = DockyardConfig::default();
    config.build.apt_mirror = Some("mirrors.aliyun.com".to_owned());

    let output = render(&config);
    let build = build_section(&output);

    let mirror_at = build.find("mirrors.aliyun.com").unwrap();
    let install_at = build.find("apt-get install").unwrap();
    assert!(mirror_at < install_at);
}

#[test]
fn no_mirror_lines_by_default() {
    let output = render(&DockyardConfig::default());

    assert!(!output.contains("PIP_INDEX_URL"));
    assert!(!output.contains("deb.debian.org"));
}

#[test]
fn include_copies_only_specified_paths() {
    let mut config = DockyardConfig::default();
    config.build.include = Some(vec!["stock_select/".to_owned(), "templates/".to_owned()]);

    let output = render(&config);
    let runtime = runtime_section(&output);

    assert!(runtime.contains("COPY stock_select/ ./stock_select/"));
    assert!(runtime.contains("COPY templates/ ./templates/"));
    assert!(runtime.contains("COPY start_app.py ./start_app.py"));
    assert!(!runtime.contains("COPY . ."));
}

#[test]
fn build_env_is_rendered_sorted() {
    let mut env = HashMap::new();
    env.insert("SKIP_INITIAL_DOWNLOAD".to_owned(), "true".to_owned());
    env.insert("LOG_LEVEL".to_owned(), "info".to_owned());
    let mut config = DockyardConfig::default();
    config.build.env = env;

    let output = render(&config);

    let log_at = output.find("ENV LOG_LEVEL=info").unwrap();
    let skip_at = output.find("ENV SKIP_INITIAL_DOWNLOAD=true").unwrap();
    assert!(log_at < skip_at);
}

#[test]
fn env_value_with_space_is_quoted() {
    let mut config = DockyardConfig::default();
    config
        .build
        .env
        .insert("GREETING".to_owned(), "hello world".to_owned());

    let output = render(&config);

    assert!(output.contains("ENV GREETING=\"hello world\"\n"));
    // Plain values keep the bare form so `$PATH` still expands
    assert!(output.contains("ENV PATH=/root/.local/bin:$PATH\n"));
}

#[test]
fn include_path_with_space_uses_json_copy() {
    let mut config = DockyardConfig::default();
    config.build.include = Some(vec!["report templates/".to_owned()]);

    let output = render(&config);
    let runtime = runtime_section(&output);

    assert!(runtime.contains(r#"COPY ["report templates/", "./report templates/"]"#));
    assert!(runtime.contains("COPY start_app.py ./start_app.py"));
}

#[test]
fn runtime_dirs_with_space_are_shell_quoted() {
    let mut config = DockyardConfig::default();
    config.build.runtime_dirs = vec!["data".to_owned(), "app logs".to_owned()];

    let output = render(&config);

    assert!(output.contains("RUN mkdir -p data 'app logs'\n"));
}

#[test]
fn spec_serializes_stage_roles() {
    let spec = ArtifactSpec::from_config(&DockyardConfig::default(), &default_project());
    let json = serde_json::to_value(&spec).unwrap();

    assert_eq!(json["stages"][0]["role"], "build");
    assert_eq!(json["stages"][1]["role"], "runtime");
    assert_eq!(json["stages"][0]["steps"][0]["kind"], "mirror");
}

// ── Bundle Tests ──

#[test]
fn bundle_creates_expected_structure() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    let bundle_dir = create_bundle(project, "FROM python\n", &[]).unwrap();

    assert!(bundle_dir.join("Dockerfile").exists());
    assert!(bundle_dir.join("requirements.txt").exists());
    assert!(bundle_dir.join("start_app.py").exists());
    assert!(bundle_dir.join("stock_select/__init__.py").exists());

    let dockerfile = std::fs::read_to_string(bundle_dir.join("Dockerfile")).unwrap();
    assert_eq!(dockerfile, "FROM python\n");
}

#[test]
fn bundle_respects_gitignore() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    std::fs::create_dir_all(project.join("logs")).unwrap();
    std::fs::write(project.join("requirements.txt"), "flask\n").unwrap();
    std::fs::write(project.join("start_app.py"), "").unwrap();
    std::fs::write(project.join("logs/app.log"), "noise").unwrap();
    std::fs::write(project.join(".gitignore"), "logs/\n").unwrap();
    commit_all(project);

    let bundle_dir = create_bundle(project, "FROM python\n", &[]).unwrap();

    assert!(!bundle_dir.join("logs").exists());
    assert!(bundle_dir.join("start_app.py").exists());
    assert!(bundle_dir.join(".gitignore").exists());
}

#[test]
fn bundle_excludes_data_directory() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    // Untracked, not ignored: would be picked up by --others
    std::fs::create_dir_all(project.join("redis_data")).unwrap();
    std::fs::write(project.join("redis_data/dump.rdb"), "REDIS").unwrap();

    let bundle_dir = create_bundle(project, "FROM python\n", &["./redis_data"]).unwrap();

    assert!(!bundle_dir.join("redis_data").exists());
    assert!(bundle_dir.join("start_app.py").exists());
}

#[test]
fn bundle_never_nests_itself() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    create_bundle(project, "FROM python:1\n", &[]).unwrap();
    let bundle_dir = create_bundle(project, "FROM python:2\n", &[]).unwrap();

    assert!(!bundle_dir.join(".dockyard-bundle").exists());
    let content = std::fs::read_to_string(bundle_dir.join("Dockerfile")).unwrap();
    assert_eq!(content, "FROM python:2\n");
}

#[test]
fn bundle_skips_tracked_files_deleted_from_worktree() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);
    std::fs::remove_file(project.join("stock_select/__init__.py")).unwrap();

    let bundle_dir = create_bundle(project, "FROM python\n", &[]).unwrap();

    assert!(!bundle_dir.join("stock_select/__init__.py").exists());
}

#[test]
fn bundle_fails_outside_git_repository() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("start_app.py"), "").unwrap();

    let err = create_bundle(tmp.path(), "FROM python\n", &[]).unwrap_err();

    assert!(matches!(&err, BundleError::GitExit { subcommand, .. } if subcommand == "ls-files"));
    assert!(!tmp.path().join(".dockyard-bundle").exists());
}

// ── Dirty Check Tests ──

#[test]
fn is_dirty_clean_repo() {
    let tmp = TempDir::new().unwrap();
    init_git_project(tmp.path());

    assert!(!is_dirty(tmp.path(), &[]).unwrap());
}

#[test]
fn is_dirty_with_uncommitted_changes() {
    let tmp = TempDir::new().unwrap();
    init_git_project(tmp.path());

    std::fs::write(tmp.path().join("start_app.py"), "print('dirty')\n").unwrap();

    assert!(is_dirty(tmp.path(), &[]).unwrap());
}

#[test]
fn is_dirty_with_untracked_file() {
    let tmp = TempDir::new().unwrap();
    init_git_project(tmp.path());

    std::fs::write(tmp.path().join("new_file.txt"), "hello").unwrap();

    assert!(is_dirty(tmp.path(), &[]).unwrap());
}

#[test]
fn is_dirty_ignores_bundle_directory() {
    let tmp = TempDir::new().unwrap();
    init_git_project(tmp.path());

    create_bundle(tmp.path(), "FROM python\n", &[]).unwrap();

    assert!(!is_dirty(tmp.path(), &[]).unwrap());
}

#[test]
fn is_dirty_ignores_excluded_data_directory() {
    let tmp = TempDir::new().unwrap();
    init_git_project(tmp.path());

    std::fs::create_dir_all(tmp.path().join("redis_data")).unwrap();
    std::fs::write(tmp.path().join("redis_data/dump.rdb"), "REDIS").unwrap();

    assert!(is_dirty(tmp.path(), &[]).unwrap());
    assert!(!is_dirty(tmp.path(), &["./redis_data"]).unwrap());

    // Changes elsewhere still count
    std::fs::write(tmp.path().join("start_app.py"), "print('dirty')\n").unwrap();
    assert!(is_dirty(tmp.path(), &["redis_data"]).unwrap());
}
