use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DataPath {
    pub root: PathBuf,
}

impl DataPath {
    pub fn new(data_path: Option<PathBuf>) -> io::Result<Self> {
        let root = match data_path {
            Some(path) => path,
            None => dirs::home_dir()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        "Home directory not found. Please specify --data-path.",
                    )
                })?
                .join(".imagelingo"),
        };

        Ok(Self { root })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.root.join("error.log")
    }
}

pub fn validate_generation_id(id: &str) -> io::Result<()> {
    if id.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Generation id cannot be empty",
        ));
    }

    if id.len() > 128 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Generation id too long (max 128 characters)",
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Generation id contains invalid characters",
        ));
    }

    Ok(())
}

pub fn validate_api_url(value: &str) -> io::Result<()> {
    let parsed = url::Url::parse(value.trim()).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid API URL: {e}"))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "API URL must use http or https",
        ));
    }

    if parsed.host_str().is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "API URL must include a host",
        ));
    }

    Ok(())
}
