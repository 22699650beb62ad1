use std::path::{Path, PathBuf};

use crate::bioinformatics::software::Tool;

/// Coverage files from alignments, only ever called by PORT
pub struct Sam2Cov;

impl Tool for Sam2Cov {
    const NAME: &'static str = "SAM2COV";

    fn install_steps(version: &str, location: &Path) -> String {
        let location = location.display();
        format!(
            r#"
            wget https://github.com/khayer/sam2cov/archive/v{version}.tar.gz
            tar -xzf v{version}.tar.gz --strip-components 1 --directory {location}

            cd {location}
            make
            "#
        )
    }

    fn executable(location: &Path) -> PathBuf {
        location.join("sam2cov")
    }
}
