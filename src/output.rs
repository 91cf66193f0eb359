use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::PersistError;
use crate::pipeline::Champion;

/// Write pretty JSON next to `path`, then rename over it. Readers never see a half-written file.
pub fn write_champions(path: &Path, champions: &[Champion]) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(champions)?;

    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    info!("Wrote {} champions to {}", champions.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn champion(name: &str) -> Champion {
        Champion {
            name: name.into(),
            role: "Director of Eng".into(),
            company: "Acme".into(),
            company_size: "300 employees".into(),
            source: "https://vendor.test/customers".into(),
        }
    }

    #[test]
    fn writes_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("champions.json");
        write_champions(&path, &[champion("A")]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "name": "A",
                "role": "Director of Eng",
                "company": "Acme",
                "companySize": "300 employees",
                "source": "https://vendor.test/customers",
            }])
        );
        assert!(text.contains("\n  "));
    }

    #[test]
    fn unwritable_path_is_io_error_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("champions.json");

        let err = write_champions(&path, &[champion("A")]).unwrap_err();
        assert!(matches!(err, PersistError::Io { path: ref p, .. } if *p == path));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
    }

    #[test]
    fn overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("champions.json");
        write_champions(&path, &[champion("A"), champion("B")]).unwrap();
        write_champions(&path, &[]).unwrap();

        let back: Vec<Champion> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(back.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
