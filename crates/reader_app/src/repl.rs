//! Interactive reading loop for `reader open`.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use reader_core::SessionPhase;
use reader_engine::{ReaderEngine, ReadingSessionHandle};
use reader_logging::reader_info;
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Next,
    Previous,
    Goto(i64),
    Contents,
    Capacity(usize),
    Help,
    Quit,
}

impl Input {
    /// An empty line turns the page.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let input = match words.next() {
            None | Some("n") => Self::Next,
            Some("p") => Self::Previous,
            Some("g") => Self::Goto(words.next()?.parse::<i64>().ok()?.checked_sub(1)?),
            Some("t") => Self::Contents,
            Some("c") => Self::Capacity(words.next()?.parse().ok()?),
            Some("h" | "?") => Self::Help,
            Some("q") => Self::Quit,
            Some(_) => return None,
        };
        words.next().is_none().then_some(input)
    }
}

const HELP: &str = "n: next page, p: previous page, g <n>: go to chapter n, t: contents, \
                    c <n>: characters per page, q: quit";

pub fn read_book(
    runtime: &Runtime,
    engine: &ReaderEngine,
    book_id: &str,
    capacity: Option<usize>,
) -> Result<()> {
    let mut session = runtime.block_on(engine.load_book(book_id))?;
    if let Some(capacity) = capacity {
        session.set_capacity(capacity);
    }
    render(&mut session);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match Input::parse(&line) {
            Some(Input::Next) => {
                if let Err(reason) = session.next_page() {
                    println!("({reason})");
                    continue;
                }
            }
            Some(Input::Previous) => {
                if let Err(reason) = session.previous_page() {
                    println!("({reason})");
                    continue;
                }
            }
            Some(Input::Goto(index)) => {
                if let Err(err) = session.goto_chapter(index) {
                    println!("({err})");
                    continue;
                }
            }
            Some(Input::Contents) => {
                print_contents(&session);
                continue;
            }
            Some(Input::Capacity(capacity)) => session.set_capacity(capacity),
            Some(Input::Help) | None => {
                println!("{HELP}");
                continue;
            }
            Some(Input::Quit) => break,
        }
        runtime.block_on(session.settle());
        render(&mut session);
    }

    session.close();
    reader_info!("Closed {book_id}");
    Ok(())
}

fn render(session: &mut ReadingSessionHandle) {
    let view = session.view();
    if view.phase != SessionPhase::Ready {
        return;
    }
    println!();
    println!(
        "== {} ({}/{}), page {}/{} ==",
        view.chapter_title,
        view.chapter_index + 1,
        view.chapter_count,
        view.page_index + 1,
        view.page_count
    );
    println!("{}", view.page_text);
    for notice in session.take_notices() {
        println!("! {notice}");
    }
}

fn print_contents(session: &ReadingSessionHandle) {
    let current = session.view().chapter_index;
    for entry in session.toc_entries() {
        let marker = if entry.target_chapter_index == current {
            '*'
        } else {
            ' '
        };
        println!(
            "{marker} {:>4}  {}",
            entry.target_chapter_index + 1,
            entry.title
        );
    }
}
