use std::path::{Path, PathBuf};

/// Writes an executable shell script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::fs;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(&path, perms).unwrap();
    }
    path
}

/// Creates `names` as files under `dir`, each holding `content`.
pub fn touch_all(dir: &Path, names: &[&str], content: &str) {
    for name in names {
        std::fs::write(dir.join(name), content).unwrap();
    }
}
