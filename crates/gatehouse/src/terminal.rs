//! Interactive terminal driver for the login flows.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use gatehouse::captcha::{SolveResult, decode_image, parse_points};
use gatehouse::navigate::WatchNavigator;
use gatehouse::notify::{NoticeLevel, Notifier};
use gatehouse::phone::PhoneLoginFlow;
use gatehouse::qr::QrLoginController;
use gatehouse::{LoginMethod, LoginPage};
use gatehouse_common::{CaptchaChallenge, GatehouseError, QrPhase};

/// How long to wait for the captcha to swap in a new image after a miss
const CHALLENGE_WAIT: Duration = Duration::from_secs(5);

/// Prints notices to stderr, keeping stdout for results
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {message}");
    }
}

/// Line-oriented stdin reader
pub struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Show `label` and read one trimmed line; `None` on end of input
    pub async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        eprint!("{label}");
        std::io::stderr().flush().context("Failed to flush stderr")?;

        let line = self
            .lines
            .next_line()
            .await
            .context("Failed to read from stdin")?;
        Ok(line.map(|l| l.trim().to_string()))
    }
}

enum Step {
    Done,
    Switch,
    Quit,
}

/// Drive the mounted flow until login completes or the user gives up.
///
/// Returns true when the page navigated into the application.
pub async fn run_login(
    page: &mut LoginPage,
    navigator: &WatchNavigator,
    image_dir: &Path,
) -> Result<bool> {
    let mut prompt = Prompt::new();

    loop {
        let step = match page.method() {
            LoginMethod::Phone => {
                let flow = page.phone().context("Phone login is not mounted")?;
                phone_session(flow, &mut prompt, image_dir).await?
            }
            LoginMethod::Wechat => {
                let qr = page.wechat().context("WeChat login is not mounted")?;
                wechat_session(qr, &mut prompt).await?
            }
        };

        match step {
            Step::Done => return Ok(navigator.last().is_some()),
            Step::Quit => return Ok(false),
            Step::Switch => {
                let method = page.toggle().await;
                tracing::debug!(method = ?method, "Switched login method");
            }
        }
    }
}

async fn phone_session(
    flow: &PhoneLoginFlow,
    prompt: &mut Prompt,
    image_dir: &Path,
) -> Result<Step> {
    loop {
        let Some(phone) = prompt.ask("Phone number ('w' for WeChat login): ").await? else {
            return Ok(Step::Quit);
        };
        if phone == "w" {
            return Ok(Step::Switch);
        }

        flow.set_phone(phone);
        match flow.request_code().await {
            Ok(()) => {
                if solve_captcha(flow, prompt, image_dir).await? {
                    break;
                }
            }
            Err(e @ GatehouseError::Busy(_)) => {
                eprintln!("{e}");
                break;
            }
            // Already reported through the notifier.
            Err(_) => continue,
        }
    }

    loop {
        let Some(code) = prompt.ask("SMS code: ").await? else {
            return Ok(Step::Quit);
        };
        flow.set_code(code);
        if flow.submit().await.is_ok() {
            return Ok(Step::Done);
        }
    }
}

/// Returns true once the captcha passed, false when the user cancelled
async fn solve_captcha(flow: &PhoneLoginFlow, prompt: &mut Prompt, image_dir: &Path) -> Result<bool> {
    let captcha = flow.captcha();

    loop {
        let Some(challenge) = captcha.view().challenge else {
            let answer = prompt
                .ask("Captcha unavailable. Enter to retry, 'c' to cancel: ")
                .await?;
            if matches!(answer.as_deref(), None | Some("c")) {
                captcha.close();
                return Ok(false);
            }
            refresh_challenge(flow).await;
            continue;
        };

        let (image, thumb) = write_challenge(image_dir, &challenge).await?;
        eprintln!("Captcha image: {}", image.display());
        eprintln!("Click, in order, the items shown in: {}", thumb.display());

        let Some(answer) = prompt
            .ask("Points as x,y x,y ... ('r' for a new image, 'c' to cancel): ")
            .await?
        else {
            captcha.close();
            return Ok(false);
        };

        match answer.as_str() {
            "c" => {
                captcha.close();
                return Ok(false);
            }
            "r" => {
                refresh_challenge(flow).await;
                continue;
            }
            _ => {}
        }

        let points = match parse_points(&answer) {
            Ok(points) => points,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match flow.solve_captcha(&points).await {
            Ok(SolveResult::Passed) => return Ok(true),
            Ok(SolveResult::Failed) => wait_for_new_challenge(flow, &challenge.key).await,
            // This image was already checked; fetch another one.
            Err(GatehouseError::Busy(_)) => refresh_challenge(flow).await,
            Err(_) => {}
        }
    }
}

async fn refresh_challenge(flow: &PhoneLoginFlow) {
    // Failures are already reported through the notifier.
    if let Err(e) = flow.captcha().refresh().await {
        tracing::debug!(error = %e, "Captcha refresh failed");
    }
}

async fn wait_for_new_challenge(flow: &PhoneLoginFlow, key: &str) {
    let mut rx = flow.captcha().subscribe();
    let fresh = tokio::time::timeout(
        CHALLENGE_WAIT,
        rx.wait_for(|view| view.challenge.as_ref().is_some_and(|c| c.key != key)),
    )
    .await;
    if fresh.is_err() {
        tracing::debug!(key = %key, "No new captcha challenge arrived");
    }
}

async fn write_challenge(dir: &Path, challenge: &CaptchaChallenge) -> Result<(PathBuf, PathBuf)> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let image_path = dir.join("captcha.png");
    let thumb_path = dir.join("captcha-thumb.png");

    for (payload, path) in [(&challenge.image, &image_path), (&challenge.thumb, &thumb_path)] {
        let bytes = decode_image(payload)?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok((image_path, thumb_path))
}

async fn wechat_session(qr: &QrLoginController, prompt: &mut Prompt) -> Result<Step> {
    let mut rx = qr.subscribe();
    let mut shown: Option<QrPhase> = None;

    loop {
        let snapshot = rx.borrow_and_update().clone();

        if shown != Some(snapshot.phase) {
            shown = Some(snapshot.phase);
            if let (QrPhase::Ready, Some(url)) = (snapshot.phase, &snapshot.qr_url) {
                eprintln!("Scan with WeChat: {url}");
            }
            eprintln!("{}", snapshot.status_text());

            if snapshot.phase.is_terminal() {
                if snapshot.phase == QrPhase::Confirmed {
                    return Ok(Step::Done);
                }

                let answer = prompt
                    .ask("Enter for a new code, 'p' for phone login, 'q' to quit: ")
                    .await?;
                match answer.as_deref() {
                    None | Some("q") => return Ok(Step::Quit),
                    Some("p") => return Ok(Step::Switch),
                    Some(_) => {
                        qr.refresh().await;
                        shown = None;
                        continue;
                    }
                }
            }
        }

        if rx.changed().await.is_err() {
            return Ok(Step::Quit);
        }
    }
}
