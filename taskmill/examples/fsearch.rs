//! Parallel file search over a directory tree.
//!
//! The main thread walks the tree and fans one task per file out to the
//! pool; each task reads its file and scans it for the pattern. Once the
//! walk finishes the pool is closed, drained, and the matches are collected
//! from the handles in path order.
//!
//! Usage: `fsearch <pattern> [path] [workers]`

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use taskmill::Pool;

struct Args {
    pattern: String,
    root: PathBuf,
    workers: usize,
}

fn parse_args() -> Result<Args, String> {
    let mut argv = env::args().skip(1);

    let pattern = argv
        .next()
        .ok_or("usage: fsearch <pattern> [path] [workers]")?;
    let root = PathBuf::from(argv.next().unwrap_or_else(|| ".".into()));
    let workers = match argv.next() {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("not a worker count: {raw}"))?,
        None => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    };

    if !root.is_dir() {
        return Err(format!("search path {} is not a directory", root.display()));
    }

    Ok(Args {
        pattern,
        root,
        workers,
    })
}

/// Lines of `path` containing `pattern`, tallying bytes read on the way.
fn search_file(
    path: &Path,
    pattern: &str,
    bytes_read: &AtomicUsize,
) -> io::Result<Vec<(usize, String)>> {
    let contents = fs::read(path)?;
    bytes_read.fetch_add(contents.len(), Ordering::Relaxed);

    let text = String::from_utf8_lossy(&contents);
    let matches = text
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(pattern))
        .map(|(i, line)| (i + 1, line.to_owned()))
        .collect();

    Ok(matches)
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let pool = Pool::new(args.workers);
    let bytes_read = Arc::new(AtomicUsize::new(0));

    let mut results = Vec::new();
    let mut dirs_searched = 0usize;
    let mut files_searched = 0usize;

    // Walk on the submitting thread; search on the pool.
    let mut pending = vec![args.root.clone()];
    while let Some(dir) = pending.pop() {
        dirs_searched += 1;

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("[[{}: {e}]]", dir.display());
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files_searched += 1;

                let pattern = args.pattern.clone();
                let bytes_read = Arc::clone(&bytes_read);
                let task_path = path.clone();
                let handle =
                    pool.spawn(move || search_file(&task_path, &pattern, &bytes_read));
                results.push((path, handle));
            }
        }
    }

    pool.close();
    pool.wait();

    results.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut files_matched = 0usize;
    for (path, handle) in results {
        match handle.join() {
            Ok(Ok(matches)) => {
                if !matches.is_empty() {
                    files_matched += 1;
                }
                for (line_number, line) in matches {
                    println!("{}:{line_number}:{line}", path.display());
                }
            }
            // Unreadable file; report it and keep going.
            Ok(Err(e)) => eprintln!("[[{}: {e}]]", path.display()),
            // The search closure itself failed.
            Err(e) => eprintln!("[[{}: {e}]]", path.display()),
        }
    }

    eprintln!(
        "[[searched {files_searched} files in {dirs_searched} directories, \
         read {} bytes, matched {files_matched} files]]",
        bytes_read.load(Ordering::Relaxed)
    );

    ExitCode::SUCCESS
}
