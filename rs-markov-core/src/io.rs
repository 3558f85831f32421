use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Extension of human-readable state files. Any other extension is binary.
pub const JSON_EXTENSION: &str = "json";
/// Extension of compact binary state files.
pub const BINARY_EXTENSION: &str = "bin";

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/input.txt` + `"bin"` → `data/input.bin`
pub fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/model.json"` → `"model"`
/// - `"model.bin"` → `"model"`
pub fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

fn is_json<P: AsRef<Path>>(path: P) -> bool {
	path.as_ref().extension() == Some(std::ffi::OsStr::new(JSON_EXTENSION))
}

/// Writes a state to disk, creating missing parent directories.
///
/// `.json` files are written as JSON, anything else with `postcard`.
pub fn save_state<P: AsRef<Path>, T: Serialize>(path: P, state: &T) -> Result<()> {
	let bytes = if is_json(&path) {
		serde_json::to_vec(state)?
	} else {
		postcard::to_stdvec(state)?
	};
	if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, bytes)?;
	Ok(())
}

/// Reads a state written by [`save_state`].
pub fn load_state<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
	let bytes = fs::read(&path)?;
	if is_json(&path) {
		Ok(serde_json::from_slice(&bytes)?)
	} else {
		Ok(postcard::from_bytes(&bytes)?)
	}
}

/// Lists the names (without extension) of the state files in a directory.
///
/// Only `.json` and `.bin` files directly in `dir` are considered. The result
/// is sorted and deduplicated.
pub fn list_states<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
	let mut names = Vec::new();

	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();

		if path.is_file() {
			let known = path
				.extension()
				.is_some_and(|ext| ext == JSON_EXTENSION || ext == BINARY_EXTENSION);
			if known {
				names.push(get_filename(&path)?);
			}
		}
	}

	names.sort();
	names.dedup();
	Ok(names)
}

/// Finds the state file called `name` in `dir`, preferring JSON.
pub fn find_state<P: AsRef<Path>>(dir: P, name: &str) -> Option<PathBuf> {
	[JSON_EXTENSION, BINARY_EXTENSION]
		.iter()
		.map(|ext| dir.as_ref().join(format!("{name}.{ext}")))
		.find(|path| path.is_file())
}
