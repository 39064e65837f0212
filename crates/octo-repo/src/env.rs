use std::path::PathBuf;

/// Environment variables that redirect repository paths.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub git_dir: Option<PathBuf>,
    pub work_tree: Option<PathBuf>,
    pub object_directory: Option<PathBuf>,
    pub index_file: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            git_dir: var("GIT_DIR"),
            work_tree: var("GIT_WORK_TREE"),
            object_directory: var("GIT_OBJECT_DIRECTORY"),
            index_file: var("GIT_INDEX_FILE"),
        }
    }
}
