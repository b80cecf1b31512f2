use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io;
use std::path::{Path, PathBuf};

const INDENT: &[u8] = b"    ";

/// Writes one pretty-printed JSON file per resource into a fixed directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
	directory: PathBuf,
}

impl JsonFileSink {
	pub fn new(directory: impl Into<PathBuf>) -> Self {
		Self {
			directory: directory.into(),
		}
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	/// Creates the output directory if it does not exist yet.
	pub async fn prepare(&self) -> io::Result<()> {
		tokio::fs::create_dir_all(&self.directory).await
	}

	/// The file that receives the document of the given resource.
	///
	/// Returns `None` for identifiers that would leave the output directory.
	pub fn path_for(&self, resource: &str) -> Option<PathBuf> {
		if resource.contains(std::path::is_separator) {
			return None;
		}
		Some(self.directory.join(format!("{resource}_info.json")))
	}

	/// Serializes `document` with an indentation of four spaces and replaces the file of `resource`.
	pub async fn write<T: Serialize + Sync>(&self, resource: &str, document: &T) -> io::Result<PathBuf> {
		let path = self.path_for(resource).ok_or_else(|| {
			io::Error::new(
				io::ErrorKind::InvalidInput,
				format!("{resource:?} is not a valid file name"),
			)
		})?;
		tokio::fs::write(&path, to_pretty_json(document)?).await?;
		Ok(path)
	}
}

fn to_pretty_json<T: Serialize>(document: &T) -> io::Result<Vec<u8>> {
	let mut buffer = Vec::new();
	let mut serializer =
		serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(INDENT));
	document.serialize(&mut serializer)?;
	Ok(buffer)
}
