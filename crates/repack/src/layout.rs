//! Deployment layout reorganization
//!
//! Turns the extracted runtime and templates trees into the deployment tree:
//!
//! ```text
//! <runtime tree>/<executable>     -> <deploy>/usr/bin/godot (0755)
//! <runtime tree>/GodotSharp/      -> <deploy>/usr/bin/GodotSharp/
//! <templates tree>                -> <deploy>/etc/godot/templates/ (replaced)
//! ```
//!
//! The steps run in a fixed order and each one relies on the file system
//! state left by the previous one. A failing step stops the sequence; steps
//! already done are not rolled back.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{PathCheckMode, RepackConfig};
use crate::error::{RepackError, Result};
use crate::release::ReleaseInfo;

/// Mode given to the installed executable
pub const EXECUTABLE_MODE: u32 = 0o755;

/// One step of the layout plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStep {
    LocateExecutable,
    LocateLibraries,
    RenameExecutable,
    SetExecutablePermissions,
    MoveExecutable,
    MoveLibraries,
    /// Removes a previous templates directory so the new one replaces it
    /// instead of being merged into it
    ReplaceExistingTemplates,
    MoveTemplates,
    RemoveRuntimeTree,
}

impl LayoutStep {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutStep::LocateExecutable => "locate-executable",
            LayoutStep::LocateLibraries => "locate-libraries",
            LayoutStep::RenameExecutable => "rename-executable",
            LayoutStep::SetExecutablePermissions => "set-executable-permissions",
            LayoutStep::MoveExecutable => "move-executable",
            LayoutStep::MoveLibraries => "move-libraries",
            LayoutStep::ReplaceExistingTemplates => "replace-existing-templates",
            LayoutStep::MoveTemplates => "move-templates",
            LayoutStep::RemoveRuntimeTree => "remove-runtime-tree",
        }
    }
}

impl fmt::Display for LayoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of layout steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    steps: Vec<LayoutStep>,
}

impl LayoutPlan {
    /// The fixed plan used for every run
    pub fn standard() -> Self {
        Self {
            steps: vec![
                LayoutStep::LocateExecutable,
                LayoutStep::LocateLibraries,
                LayoutStep::RenameExecutable,
                LayoutStep::SetExecutablePermissions,
                LayoutStep::MoveExecutable,
                LayoutStep::MoveLibraries,
                LayoutStep::ReplaceExistingTemplates,
                LayoutStep::MoveTemplates,
                LayoutStep::RemoveRuntimeTree,
            ],
        }
    }

    pub fn steps(&self) -> &[LayoutStep] {
        &self.steps
    }
}

impl Default for LayoutPlan {
    fn default() -> Self {
        Self::standard()
    }
}

/// Concrete source and target paths for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPaths {
    pub runtime_tree_root: PathBuf,
    pub executable: PathBuf,
    pub renamed_executable: PathBuf,
    pub libraries: PathBuf,
    pub templates_source: PathBuf,
    pub target_bin_dir: PathBuf,
    pub target_executable: PathBuf,
    pub target_libraries: PathBuf,
    pub target_templates: PathBuf,
}

impl LayoutPaths {
    /// Derive the paths from the two extracted trees and the deployment root
    pub fn new(
        runtime_tree_root: &Path,
        templates_tree_root: &Path,
        deploy_root: &Path,
        config: &RepackConfig,
        release: &ReleaseInfo,
    ) -> Self {
        let target_bin_dir = deploy_root.join(&config.bin_dir);
        Self {
            runtime_tree_root: runtime_tree_root.to_path_buf(),
            executable: runtime_tree_root.join(&release.executable_name),
            renamed_executable: runtime_tree_root.join(&config.executable_target_name),
            libraries: runtime_tree_root.join(&config.libraries_dir_name),
            templates_source: templates_tree_root.to_path_buf(),
            target_executable: target_bin_dir.join(&config.executable_target_name),
            target_libraries: target_bin_dir.join(&config.libraries_dir_name),
            target_templates: deploy_root.join(&config.templates_target),
            target_bin_dir,
        }
    }
}

/// Outcome of a completed reorganization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutReport {
    /// Steps that ran, in order
    pub completed: Vec<LayoutStep>,
    /// Expected paths that were missing in lenient mode
    pub missing: Vec<PathBuf>,
    /// Whether a previous templates directory was removed
    pub replaced_templates: bool,
}

/// Executes a [`LayoutPlan`] against [`LayoutPaths`]
#[derive(Debug, Clone)]
pub struct LayoutReorganizer {
    plan: LayoutPlan,
    mode: PathCheckMode,
}

impl LayoutReorganizer {
    pub fn new(mode: PathCheckMode) -> Self {
        Self {
            plan: LayoutPlan::standard(),
            mode,
        }
    }

    pub fn plan(&self) -> &LayoutPlan {
        &self.plan
    }

    /// Run every step of the plan, stopping at the first failure
    pub async fn reorganize(&self, paths: &LayoutPaths) -> Result<LayoutReport> {
        info!("Reorganizing into {}", paths.target_bin_dir.display());
        let mut report = LayoutReport::default();

        for step in self.plan.steps() {
            debug!("Layout step: {}", step);
            self.run_step(*step, paths, &mut report).await?;
            report.completed.push(*step);
        }

        Ok(report)
    }

    async fn run_step(&self, step: LayoutStep, paths: &LayoutPaths, report: &mut LayoutReport) -> Result<()> {
        match step {
            LayoutStep::LocateExecutable => {
                self.locate(step, &paths.executable, "executable", report).await
            }
            LayoutStep::LocateLibraries => {
                self.locate(step, &paths.libraries, "libraries", report).await
            }
            LayoutStep::RenameExecutable => {
                rename(step, &paths.executable, &paths.renamed_executable).await
            }
            LayoutStep::SetExecutablePermissions => {
                set_executable(step, &paths.renamed_executable).await
            }
            LayoutStep::MoveExecutable => {
                rename(step, &paths.renamed_executable, &paths.target_executable).await
            }
            LayoutStep::MoveLibraries => {
                rename(step, &paths.libraries, &paths.target_libraries).await
            }
            LayoutStep::ReplaceExistingTemplates => {
                if exists(step, &paths.target_templates).await? {
                    info!("Removing previous templates at {}", paths.target_templates.display());
                    fs::remove_dir_all(&paths.target_templates)
                        .await
                        .map_err(|e| layout_error(step, &paths.target_templates, e))?;
                    report.replaced_templates = true;
                }
                Ok(())
            }
            LayoutStep::MoveTemplates => {
                rename(step, &paths.templates_source, &paths.target_templates).await
            }
            LayoutStep::RemoveRuntimeTree => {
                fs::remove_dir_all(&paths.runtime_tree_root)
                    .await
                    .map_err(|e| layout_error(step, &paths.runtime_tree_root, e))
            }
        }
    }

    async fn locate(&self, step: LayoutStep, path: &Path, what: &str, report: &mut LayoutReport) -> Result<()> {
        if exists(step, path).await? {
            info!("Found {} at: {}", what, path.display());
            return Ok(());
        }

        match self.mode {
            PathCheckMode::Strict => Err(RepackError::MissingLayoutPath {
                step: step.name(),
                path: path.to_path_buf(),
            }),
            PathCheckMode::Lenient => {
                warn!("Expected {} at {} but it is missing, continuing", what, path.display());
                report.missing.push(path.to_path_buf());
                Ok(())
            }
        }
    }
}

fn layout_error(step: LayoutStep, path: &Path, source: std::io::Error) -> RepackError {
    RepackError::Layout {
        step: step.name(),
        path: path.to_path_buf(),
        source,
    }
}

async fn exists(step: LayoutStep, path: &Path) -> Result<bool> {
    fs::try_exists(path).await.map_err(|e| layout_error(step, path, e))
}

async fn rename(step: LayoutStep, from: &Path, to: &Path) -> Result<()> {
    debug!("Moving {} to {}", from.display(), to.display());
    fs::rename(from, to).await.map_err(|e| layout_error(step, from, e))
}

#[cfg(unix)]
async fn set_executable(step: LayoutStep, path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
        .await
        .map_err(|e| layout_error(step, path, e))
}

#[cfg(not(unix))]
async fn set_executable(_step: LayoutStep, _path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        config: RepackConfig,
        paths: LayoutPaths,
    }

    /// Work directory with both extracted trees and an empty deployment scaffold
    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let config = RepackConfig::default().with_work_dir(dir.path());
        let release = ReleaseInfo::from_version("4.2.1-stable", "4.2.1", &config).unwrap();
        let paths = LayoutPaths::new(
            &dir.path().join(&release.runtime_dir_name),
            &dir.path().join(&config.templates_dir_name),
            &config.deploy_root_path(),
            &config,
            &release,
        );

        std::fs::create_dir_all(paths.libraries.join("Api")).unwrap();
        std::fs::write(&paths.executable, b"\x7fELF engine").unwrap();
        std::fs::write(paths.libraries.join("Api/GodotSharp.dll"), b"MZ").unwrap();

        std::fs::create_dir_all(&paths.templates_source).unwrap();
        std::fs::write(paths.templates_source.join("version.txt"), b"4.2.1.stable.mono").unwrap();

        std::fs::create_dir_all(&paths.target_bin_dir).unwrap();
        std::fs::create_dir_all(paths.target_templates.parent().unwrap()).unwrap();

        Fixture { _dir: dir, config, paths }
    }

    #[test]
    fn test_standard_plan_orders_destructive_steps() {
        let plan = LayoutPlan::standard();
        let position = |step: LayoutStep| plan.steps().iter().position(|s| *s == step).unwrap();

        assert!(position(LayoutStep::ReplaceExistingTemplates) < position(LayoutStep::MoveTemplates));
        assert!(position(LayoutStep::MoveExecutable) < position(LayoutStep::RemoveRuntimeTree));
        assert!(position(LayoutStep::MoveLibraries) < position(LayoutStep::RemoveRuntimeTree));
        assert_eq!(plan.steps().last(), Some(&LayoutStep::RemoveRuntimeTree));
        assert_eq!(LayoutStep::ReplaceExistingTemplates.name(), "replace-existing-templates");
    }

    #[test]
    fn test_paths_follow_configuration() {
        let fixture = fixture();
        let work_dir = &fixture.config.work_dir;

        assert_eq!(
            fixture.paths.executable,
            work_dir.join("Godot_v4.2.1-stable_mono_linux_headless_64/Godot_v4.2.1-stable_mono_linux_headless.64")
        );
        assert_eq!(fixture.paths.target_executable, work_dir.join("deb/usr/bin/godot"));
        assert_eq!(fixture.paths.target_libraries, work_dir.join("deb/usr/bin/GodotSharp"));
        assert_eq!(fixture.paths.target_templates, work_dir.join("deb/etc/godot/templates"));
    }

    #[tokio::test]
    async fn test_reorganize_builds_deployment_tree() {
        let fixture = fixture();
        let paths = &fixture.paths;

        let report = LayoutReorganizer::new(PathCheckMode::Strict)
            .reorganize(paths)
            .await
            .unwrap();

        assert_eq!(report.completed, LayoutPlan::standard().steps().to_vec());
        assert!(report.missing.is_empty());
        assert!(!report.replaced_templates);

        assert_eq!(std::fs::read(&paths.target_executable).unwrap(), b"\x7fELF engine");
        assert!(paths.target_libraries.join("Api/GodotSharp.dll").is_file());
        assert!(paths.target_templates.join("version.txt").is_file());
        assert!(!paths.runtime_tree_root.exists());
        assert!(!paths.templates_source.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reorganize_marks_executable() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = fixture();
        LayoutReorganizer::new(PathCheckMode::Strict)
            .reorganize(&fixture.paths)
            .await
            .unwrap();

        let mode = std::fs::metadata(&fixture.paths.target_executable).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, EXECUTABLE_MODE);
    }

    #[tokio::test]
    async fn test_reorganize_replaces_existing_templates_instead_of_merging() {
        let fixture = fixture();
        let paths = &fixture.paths;
        std::fs::create_dir_all(paths.target_templates.join("old")).unwrap();
        std::fs::write(paths.target_templates.join("old/stale.tpl"), b"stale").unwrap();
        std::fs::write(paths.target_templates.join("version.txt"), b"4.1.0.stable.mono").unwrap();

        let report = LayoutReorganizer::new(PathCheckMode::Strict)
            .reorganize(paths)
            .await
            .unwrap();

        assert!(report.replaced_templates);
        assert!(report.completed.contains(&LayoutStep::ReplaceExistingTemplates));
        assert!(!paths.target_templates.join("old").exists());
        assert_eq!(
            std::fs::read_to_string(paths.target_templates.join("version.txt")).unwrap(),
            "4.2.1.stable.mono"
        );
    }

    #[tokio::test]
    async fn test_strict_mode_aborts_before_moving_anything() {
        let fixture = fixture();
        let paths = &fixture.paths;
        std::fs::remove_file(&paths.executable).unwrap();

        let result = LayoutReorganizer::new(PathCheckMode::Strict).reorganize(paths).await;

        match result {
            Err(RepackError::MissingLayoutPath { step, path }) => {
                assert_eq!(step, "locate-executable");
                assert_eq!(path, paths.executable);
            }
            other => panic!("Expected MissingLayoutPath error, got {:?}", other),
        }
        assert!(paths.libraries.is_dir());
        assert!(paths.templates_source.is_dir());
        assert!(!paths.target_libraries.exists());
    }

    #[tokio::test]
    async fn test_lenient_mode_continues_until_a_step_fails() {
        let fixture = fixture();
        let paths = &fixture.paths;
        std::fs::remove_dir_all(&paths.libraries).unwrap();

        let result = LayoutReorganizer::new(PathCheckMode::Lenient).reorganize(paths).await;

        match result {
            Err(RepackError::Layout { step, .. }) => assert_eq!(step, "move-libraries"),
            other => panic!("Expected Layout error, got {:?}", other),
        }
        // Earlier steps are not rolled back
        assert!(paths.target_executable.is_file());
        assert!(paths.templates_source.is_dir());
        assert!(paths.runtime_tree_root.is_dir());
    }

    #[tokio::test]
    async fn test_missing_scaffold_fails_move() {
        let fixture = fixture();
        let paths = &fixture.paths;
        std::fs::remove_dir_all(&paths.target_bin_dir).unwrap();

        let result = LayoutReorganizer::new(PathCheckMode::Strict).reorganize(paths).await;

        match result {
            Err(RepackError::Layout { step, .. }) => assert_eq!(step, "move-executable"),
            other => panic!("Expected Layout error, got {:?}", other),
        }
        assert!(!paths.target_bin_dir.exists());
        assert!(paths.runtime_tree_root.is_dir());
    }
}
