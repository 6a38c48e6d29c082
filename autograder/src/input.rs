//! Access to a submission delivered as a tar archive instead of a directory.

use crate::error::{Error, Result};
use crate::grader::os_interface::ProcessRunner;
use log::debug;
use std::{
    io,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// A tar archive extracted into a temporary directory, removed on drop.
#[derive(Debug)]
pub struct UnpackedArchive {
    dir: TempDir,
}

impl UnpackedArchive {
    pub fn unpack(archive: &Path) -> Result<Self> {
        if !archive.exists() {
            return Err(Error::io(
                format!("archive not found: {:?}", archive.display().to_string()),
                archive,
                io::ErrorKind::NotFound.into(),
            ));
        }
        let archive = archive.canonicalize()?;
        debug!("Archive path: {archive:?}");

        let dir = tempfile::tempdir()?;
        debug!("Created temporary directory: {:?}", dir.path());
        ProcessRunner::in_dir(dir.path()).run_command(&[
            "tar".to_string(),
            "xf".to_string(),
            archive.to_string_lossy().into_owned(),
        ])?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The directory holding the sources inside the archive.
    pub fn src_dir(&self, subdir: &Path) -> Result<PathBuf> {
        let src = self.dir.path().join(subdir);
        if !src.is_dir() {
            return Err(Error::Project(format!(
                "archive does not contain directory {:?}",
                subdir.display().to_string()
            )));
        }
        Ok(src.canonicalize()?)
    }
}

impl Drop for UnpackedArchive {
    fn drop(&mut self) {
        debug!("Deleting temporary directory {:?}", self.dir.path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, process::Command};

    fn make_archive(root: &Path) -> PathBuf {
        let content = root.join("content");
        fs::create_dir_all(content.join("src")).unwrap();
        fs::write(content.join("src").join("main.c"), "int main() {}\n").unwrap();

        let archive = root.join("submission.tar");
        let status = Command::new("tar")
            .arg("cf")
            .arg(&archive)
            .arg("-C")
            .arg(&content)
            .arg("src")
            .status()
            .unwrap();
        assert!(status.success());
        archive
    }

    #[test_log::test]
    fn should_unpack_and_locate_sources() {
        let root = tempfile::tempdir().unwrap();
        let archive = make_archive(root.path());

        let unpacked = UnpackedArchive::unpack(&archive).unwrap();
        let src = unpacked.src_dir(Path::new("src")).unwrap();
        assert!(src.join("main.c").is_file());

        let tmp = unpacked.path().to_path_buf();
        drop(unpacked);
        assert!(!tmp.exists());
    }

    #[test_log::test]
    fn should_fail_for_a_missing_archive() {
        let root = tempfile::tempdir().unwrap();
        let err = UnpackedArchive::unpack(&root.path().join("nope.tar")).unwrap_err();
        assert!(err.to_string().starts_with("archive not found"));
    }

    #[test_log::test]
    fn should_fail_when_sources_are_absent() {
        let root = tempfile::tempdir().unwrap();
        let archive = make_archive(root.path());

        let unpacked = UnpackedArchive::unpack(&archive).unwrap();
        let err = unpacked.src_dir(Path::new("source")).unwrap_err();
        assert!(matches!(err, Error::Project(_)));
    }

    #[test_log::test]
    fn should_fail_for_a_corrupt_archive() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("broken.tar");
        fs::write(&archive, "definitely not a tarball").unwrap();

        let err = UnpackedArchive::unpack(&archive).unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
    }
}
