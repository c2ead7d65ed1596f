// On-disk form of the credential store.
//
// One record per line, comma separated: `userid,digest[,permissions]`.
// Fields holding a comma, a double quote or a line break are quoted, with
// embedded quotes doubled. Saving goes through `path.new` and leaves the
// previous file at `path~`.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{char, line_ending},
    combinator::{all_consuming, consumed, map, value},
    multi::{fold_many0, separated_list0, separated_list1},
    sequence::delimited,
    IResult, Offset,
};

use super::credentials::{CredentialRecord, CredentialStoreError};

const NEW_SUFFIX: &str = ".new";
const BACKUP_SUFFIX: &str = "~";

fn parse_quoted_field(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((value("\"", tag("\"\"")), is_not("\""))),
            String::new,
            |mut acc: String, chunk: &str| {
                acc.push_str(chunk);
                acc
            },
        ),
        char('"'),
    )(input)
}

fn parse_bare_field(input: &str) -> IResult<&str, String> {
    map(
        take_while(|c: char| !matches!(c, ',' | '"' | '\r' | '\n')),
        String::from,
    )(input)
}

fn parse_field(input: &str) -> IResult<&str, String> {
    alt((parse_quoted_field, parse_bare_field))(input)
}

fn parse_record(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char(','), parse_field)(input)
}

// Each record comes back with the slice it was parsed from.
fn parse_records(input: &str) -> IResult<&str, Vec<(&str, Vec<String>)>> {
    all_consuming(separated_list0(line_ending, consumed(parse_record)))(input)
}

// 1-based line on which `rest`, a suffix of `contents`, starts.
fn line_of(contents: &str, rest: &str) -> usize {
    contents[..contents.offset(rest)].matches('\n').count() + 1
}

fn is_blank(fields: &[String]) -> bool {
    fields.len() == 1 && fields[0].is_empty()
}

/// Parses the contents of a password file. `path` is only used for error
/// reporting; errors name the physical line the bad record starts on.
pub fn parse(path: &Path, contents: &str) -> Result<Vec<CredentialRecord>, CredentialStoreError> {
    let corrupt = |line: usize, reason: String| CredentialStoreError::StoreCorrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let rows = match parse_records(contents) {
        Ok((_, rows)) => rows,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(corrupt(line_of(contents, e.input), "malformed field".to_string()));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(corrupt(0, "unexpected end of file".to_string()));
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    for (source, mut fields) in rows.into_iter().filter(|(_, f)| !is_blank(f)) {
        let number = line_of(contents, source);
        if fields.len() < 2 || fields.len() > 3 {
            return Err(corrupt(
                number,
                format!("expected 2 or 3 fields, found {}", fields.len()),
            ));
        }
        let permissions = if fields.len() == 3 {
            fields.pop().unwrap_or_default()
        } else {
            String::new()
        };
        let digest = fields.pop().unwrap_or_default();
        let userid = fields.pop().unwrap_or_default();
        if userid.is_empty() {
            return Err(corrupt(number, "empty userid".to_string()));
        }
        if digest.is_empty() {
            return Err(corrupt(number, format!("empty digest for user {}", userid)));
        }
        records.push(CredentialRecord {
            userid,
            digest,
            permissions,
        });
    }
    Ok(records)
}

fn needs_quotes(field: &str) -> bool {
    field.starts_with(' ') || field.contains(|c: char| matches!(c, ',' | '"' | '\r' | '\n'))
}

fn encode_field(out: &mut String, field: &str) {
    if needs_quotes(field) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

pub fn encode(records: &[CredentialRecord]) -> String {
    let mut out = String::new();
    for record in records {
        encode_field(&mut out, &record.userid);
        out.push(',');
        encode_field(&mut out, &record.digest);
        if !record.permissions.is_empty() {
            out.push(',');
            encode_field(&mut out, &record.permissions);
        }
        out.push('\n');
    }
    out
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn new_path(path: &Path) -> PathBuf {
    with_suffix(path, NEW_SUFFIX)
}

pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

fn persistence(stage: impl Into<String>, path: &Path, source: io::Error) -> CredentialStoreError {
    CredentialStoreError::PersistenceFailure {
        stage: stage.into(),
        path: path.to_path_buf(),
        source,
    }
}

pub fn read(path: &Path) -> Result<Vec<CredentialRecord>, CredentialStoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CredentialStoreError::StoreAbsent(path.to_path_buf()));
        }
        Err(source) => {
            return Err(CredentialStoreError::StoreUnreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse(path, &contents)
}

/// Creates an empty password file. Never truncates an existing one.
pub fn create(path: &Path) -> Result<(), CredentialStoreError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file
            .sync_all()
            .map_err(|source| persistence("error creating password file", path, source)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(CredentialStoreError::AlreadyExists(path.to_path_buf()))
        }
        Err(source) => Err(persistence("error creating password file", path, source)),
    }
}

fn write_new_file(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// Replaces the password file with `records`: write `path.new`, move `path`
/// to `path~`, then move `path.new` to `path`.
pub fn write(path: &Path, records: &[CredentialRecord]) -> Result<(), CredentialStoreError> {
    replace_file(path, &encode(records), |from, to| fs::rename(from, to))?;
    log::debug!("saved {} password records to {}", records.len(), path.display());
    Ok(())
}

fn replace_file<R>(path: &Path, contents: &str, mut rename: R) -> Result<(), CredentialStoreError>
where
    R: FnMut(&Path, &Path) -> io::Result<()>,
{
    let new_path = new_path(path);
    let backup_path = backup_path(path);

    write_new_file(&new_path, contents)
        .map_err(|source| persistence("error writing new password file", &new_path, source))?;

    rename(path, &backup_path).map_err(|source| {
        persistence(
            format!("error moving {} to backup path", path.display()),
            &backup_path,
            source,
        )
    })?;

    rename(&new_path, path).map_err(|source| {
        log::error!(
            "password file {} is missing; previous version is at {}, new version at {}",
            path.display(),
            backup_path.display(),
            new_path.display()
        );
        persistence(
            format!(
                "error moving {} into place, restore from {} or {} by hand:",
                new_path.display(),
                backup_path.display(),
                new_path.display()
            ),
            path,
            source,
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(userid: &str, digest: &str, permissions: &str) -> CredentialRecord {
        CredentialRecord {
            userid: userid.to_string(),
            digest: digest.to_string(),
            permissions: permissions.to_string(),
        }
    }

    #[test]
    fn test_parse_two_and_three_columns() {
        let records = parse(Path::new("pw"), "user1,cw1\nuser2,cw2,edit\n").unwrap();
        assert_eq!(records, vec![record("user1", "cw1", ""), record("user2", "cw2", "edit")]);
    }

    #[test]
    fn test_parse_empty_and_blank_lines() {
        assert!(parse(Path::new("pw"), "").unwrap().is_empty());
        let records = parse(Path::new("pw"), "\nuser1,cw1\r\n\n").unwrap();
        assert_eq!(records, vec![record("user1", "cw1", "")]);
    }

    #[test]
    fn test_parse_quoted_fields() {
        let records = parse(Path::new("pw"), "\"a,b\",\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(records, vec![record("a,b", "say \"hi\"", "")]);
    }

    #[test]
    fn test_encode_quotes_when_needed() {
        let records = vec![
            record("user1", "cw1", ""),
            record("a,b", "cw\"2", "edit"),
        ];
        let encoded = encode(&records);
        assert_eq!(encoded, "user1,cw1\n\"a,b\",\"cw\"\"2\",edit\n");
        assert_eq!(parse(Path::new("pw"), &encoded).unwrap(), records);
    }

    #[test]
    fn test_parse_rejects_bad_records() {
        match parse(Path::new("pw"), "user1,cw1\nuser2\n") {
            Err(CredentialStoreError::StoreCorrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt store, got {:?}", other),
        }
        assert!(matches!(
            parse(Path::new("pw"), "user1,cw1,edit,extra\n"),
            Err(CredentialStoreError::StoreCorrupt { .. })
        ));
        assert!(matches!(
            parse(Path::new("pw"), ",cw1\n"),
            Err(CredentialStoreError::StoreCorrupt { .. })
        ));
        assert!(matches!(
            parse(Path::new("pw"), "user1,\n"),
            Err(CredentialStoreError::StoreCorrupt { .. })
        ));
    }

    #[test]
    fn test_corrupt_record_reports_physical_line() {
        match parse(Path::new("pw"), "\nuser1,cw1\n\nuser2\n") {
            Err(CredentialStoreError::StoreCorrupt { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected corrupt store, got {:?}", other),
        }
        match parse(Path::new("pw"), "\"a\nb\",cw1\n,cw2\n") {
            Err(CredentialStoreError::StoreCorrupt { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected corrupt store, got {:?}", other),
        }
        match parse(Path::new("pw"), "\nuser1,cw1\nuser2,\"cw2\"x\n") {
            Err(CredentialStoreError::StoreCorrupt { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected corrupt store, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_quotes_leading_space() {
        let records = vec![record(" user1", "cw1", ""), record("user2", "cw2", " edit")];
        let encoded = encode(&records);
        assert_eq!(encoded, "\" user1\",cw1\nuser2,cw2,\" edit\"\n");
        assert_eq!(parse(Path::new("pw"), &encoded).unwrap(), records);
    }

    #[test]
    fn test_parse_rejects_unterminated_quote() {
        match parse(Path::new("pw"), "user1,cw1\nuser2,\"cw2\n") {
            Err(CredentialStoreError::StoreCorrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt store, got {:?}", other),
        }
    }

    #[test]
    fn test_read_missing_file_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        assert!(matches!(read(&path), Err(CredentialStoreError::StoreAbsent(_))));
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("passwd.txt");
        create(&path).unwrap();
        assert!(read(&path).unwrap().is_empty());
        fs::write(&path, "user1,cw1\n").unwrap();
        assert!(matches!(
            create(&path),
            Err(CredentialStoreError::AlreadyExists(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "user1,cw1\n");
    }

    #[test]
    fn test_write_keeps_backup_of_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("passwd.txt");
        fs::write(&path, "old pw file").unwrap();

        write(&path, &[record("user1", "cw1", ""), record("user3", "cw3", "")]).unwrap();

        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "old pw file");
        assert_eq!(fs::read_to_string(&path).unwrap(), "user1,cw1\nuser3,cw3\n");
        assert!(!new_path(&path).exists());
    }

    #[test]
    fn test_failed_final_rename_leaves_both_versions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("passwd.txt");
        fs::write(&path, "user1,cw1\n").unwrap();

        let result = replace_file(&path, "user1,cw2\n", |from, to| {
            if to == path.as_path() {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only directory"))
            } else {
                fs::rename(from, to)
            }
        });

        match result {
            Err(CredentialStoreError::PersistenceFailure { stage, path: failed, .. }) => {
                assert_eq!(failed, path);
                assert!(stage.contains(&backup_path(&path).display().to_string()));
                assert!(stage.contains(&new_path(&path).display().to_string()));
            }
            other => panic!("expected persistence failure, got {:?}", other),
        }
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "user1,cw1\n");
        assert_eq!(fs::read_to_string(new_path(&path)).unwrap(), "user1,cw2\n");
    }

    #[test]
    fn test_write_without_existing_file_fails_loudly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("passwd.txt");
        match write(&path, &[record("user1", "cw1", "")]) {
            Err(CredentialStoreError::PersistenceFailure { path: failed, .. }) => {
                assert_eq!(failed, backup_path(&path))
            }
            other => panic!("expected persistence failure, got {:?}", other),
        }
    }
}
