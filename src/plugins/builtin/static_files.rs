//! Static file servlet.
//!
//! Serves, writes, appends to and deletes files below a root directory.
//! Directories resolve to their `index.html`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::StatusCode;

use crate::plugins::plugin::{HandlerError, HandlerResult, Reply, RequestContext, Servlet};

const INDEX_FILE: &str = "index.html";
const PROTECTED_FILE: &str = "deleted.txt";
const ALLOWED_METHODS: &str = "GET, PUT, POST, DELETE, OPTIONS";

/// File-backed servlet rooted at a directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the root, refusing anything that could
    /// escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, HandlerError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(HandlerError::BadRequest(format!(
                        "path '{path}' leaves the root directory"
                    )))
                }
            }
        }
        if resolved.is_dir() {
            resolved.push(INDEX_FILE);
        }
        Ok(resolved)
    }

    fn read(file: &Path, status: StatusCode) -> HandlerResult {
        let body = fs::read(file)?;
        Ok(Reply::new(status)
            .with_header(CONTENT_TYPE, content_type(file))
            .with_body(body))
    }
}

impl Servlet for StaticFiles {
    fn get(&self, req: &RequestContext<'_>) -> HandlerResult {
        let file = self.resolve(req.path)?;
        match fs::metadata(&file) {
            Ok(meta) if meta.is_file() => Self::read(&file, StatusCode::OK),
            Ok(_) => Ok(not_found(req.path)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(not_found(req.path)),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, req: &RequestContext<'_>) -> HandlerResult {
        let file = self.resolve(req.path)?;
        let existed = file.is_file();
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, req.body)?;

        let status = if existed {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        Self::read(&file, status)
    }

    fn post(&self, req: &RequestContext<'_>) -> HandlerResult {
        let file = self.resolve(req.path)?;
        let existed = file.is_file();
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)?
            .write_all(req.body)?;

        let status = if existed {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        Self::read(&file, status)
    }

    fn delete(&self, req: &RequestContext<'_>) -> HandlerResult {
        let file = self.resolve(req.path)?;
        let protected = file
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.eq_ignore_ascii_case(PROTECTED_FILE));
        if protected {
            return Err(HandlerError::BadRequest(format!("{PROTECTED_FILE} cannot be deleted")));
        }

        match fs::remove_file(&file) {
            Ok(()) => {
                tracing::info!(
                    file = %file.display(),
                    client = %req.client,
                    "File deleted"
                );
                Ok(Reply::text(StatusCode::OK, format!("deleted {}\n", req.path)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(not_found(req.path)),
            Err(e) => Err(e.into()),
        }
    }

    fn options(&self, _req: &RequestContext<'_>) -> HandlerResult {
        Ok(Reply::new(StatusCode::NO_CONTENT).with_header(ALLOW, ALLOWED_METHODS))
    }
}

fn not_found(path: &str) -> Reply {
    Reply::text(StatusCode::NOT_FOUND, format!("{path} not found\n"))
}

fn content_type(file: &Path) -> &'static str {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ClientId, CorrelationId};
    use crate::plugins::plugin::serve;
    use hyper::{HeaderMap, Method};
    use std::net::IpAddr;

    fn call(servlet: &StaticFiles, method: Method, path: &str, body: &[u8]) -> HandlerResult {
        let headers = HeaderMap::new();
        let req = RequestContext {
            method: &method,
            path,
            query: None,
            headers: &headers,
            body,
            client: ClientId::from(IpAddr::from([127, 0, 0, 1])),
            correlation_id: CorrelationId::new(),
        };
        serve(servlet, &req)
    }

    #[test]
    fn get_existing_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let servlet = StaticFiles::new(dir.path());

        let reply = call(&servlet, Method::GET, "a.txt", b"").unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(&reply.body[..], b"hello");

        let reply = call(&servlet, Method::GET, "missing.txt", b"").unwrap();
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn directory_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        let servlet = StaticFiles::new(dir.path());

        let reply = call(&servlet, Method::GET, "", b"").unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.headers[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[test]
    fn put_creates_then_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let servlet = StaticFiles::new(dir.path());

        let reply = call(&servlet, Method::PUT, "notes/today.txt", b"one").unwrap();
        assert_eq!(reply.status, StatusCode::CREATED);

        let reply = call(&servlet, Method::PUT, "notes/today.txt", b"two").unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(fs::read_to_string(dir.path().join("notes/today.txt")).unwrap(), "two");
    }

    #[test]
    fn post_appends() {
        let dir = tempfile::tempdir().unwrap();
        let servlet = StaticFiles::new(dir.path());

        call(&servlet, Method::POST, "log.txt", b"a").unwrap();
        let reply = call(&servlet, Method::POST, "log.txt", b"b").unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(&reply.body[..], b"ab");
    }

    #[test]
    fn delete_respects_protected_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("deleted.txt"), "keep").unwrap();
        fs::write(dir.path().join("gone.txt"), "bye").unwrap();
        let servlet = StaticFiles::new(dir.path());

        assert!(matches!(
            call(&servlet, Method::DELETE, "deleted.txt", b""),
            Err(HandlerError::BadRequest(_))
        ));
        assert_eq!(
            call(&servlet, Method::DELETE, "gone.txt", b"").unwrap().status,
            StatusCode::OK
        );
        assert_eq!(
            call(&servlet, Method::DELETE, "gone.txt", b"").unwrap().status,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn parent_segments_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let servlet = StaticFiles::new(dir.path());
        assert!(matches!(
            call(&servlet, Method::GET, "../etc/passwd", b""),
            Err(HandlerError::BadRequest(_))
        ));
    }

    #[test]
    fn options_lists_methods() {
        let dir = tempfile::tempdir().unwrap();
        let reply = call(&StaticFiles::new(dir.path()), Method::OPTIONS, "", b"").unwrap();
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
        assert_eq!(reply.headers[ALLOW], ALLOWED_METHODS);
    }
}
