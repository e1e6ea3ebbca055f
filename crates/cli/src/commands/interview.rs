use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use quoteflow_agent::{HttpModelGateway, InterviewRuntime};
use quoteflow_core::config::{AppConfig, LoadOptions};
use quoteflow_core::{AnswerState, InterviewSession, Question, SessionPhase, CUSTOM_OPTION_LABEL};
use quoteflow_store::RecordStoreRecorder;
use tracing::info;

use crate::commands::CommandResult;

const GREETING: &str = "欢迎使用 Quoteflow 报价助手。任意提示下输入 :r 重新开始，:q 退出。";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("interview", "config_validation", error.to_string(), 2)
        }
    };
    crate::init_logging(&config);

    let tokio_runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "interview",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        }
    };

    let runtime = InterviewRuntime::new(
        Arc::new(HttpModelGateway::new(&config.llm)),
        Arc::new(RecordStoreRecorder::new(&config.record_store)),
    );
    info!(
        event_name = "system.interview.start",
        model = %config.llm.model,
        archiving = config.record_store.is_complete(),
        "interview console starting"
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = tokio_runtime.block_on(async {
        let outcome = drive(&runtime, stdin.lock(), stdout.lock()).await;
        runtime.flush_records().await;
        outcome
    });

    match result {
        Ok(()) => CommandResult::quiet(),
        Err(error) => CommandResult::failure("interview", "console", error.to_string(), 1),
    }
}

enum Reply {
    Line(String),
    Restart,
    Quit,
}

enum Flow {
    Continue,
    Quit,
}

struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    fn say(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", text.as_ref())?;
        self.output.flush()
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Reply> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(Reply::Quit);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        Ok(match line.trim() {
            ":q" => Reply::Quit,
            ":r" => Reply::Restart,
            _ => Reply::Line(line.to_string()),
        })
    }
}

/// Runs the interview wizard over a line-based console until the user quits
/// or the input ends.
pub async fn drive<R: BufRead, W: Write>(
    runtime: &InterviewRuntime,
    input: R,
    output: W,
) -> Result<()> {
    let mut console = Console { input, output };
    let mut session = InterviewSession::new();
    console.say(GREETING)?;

    loop {
        if let Some(error) = session.error().map(str::to_string) {
            console.say(format!("⚠ {error}"))?;
            session.dismiss_error();
        }

        let flow = match session.phase() {
            SessionPhase::Input => collect_request(runtime, &mut session, &mut console).await?,
            SessionPhase::Questions => {
                collect_answers(runtime, &mut session, &mut console).await?
            }
            SessionPhase::Quote => review_quote(runtime, &mut session, &mut console)?,
            phase @ (SessionPhase::Analyzing | SessionPhase::Calculating) => {
                bail!("session left waiting in {phase:?} without a pending call")
            }
        };

        if let Flow::Quit = flow {
            console.say("再见！")?;
            return Ok(());
        }
    }
}

async fn collect_request<R: BufRead, W: Write>(
    runtime: &InterviewRuntime,
    session: &mut InterviewSession,
    console: &mut Console<R, W>,
) -> Result<Flow> {
    let previous = session.request().to_string();
    let prompt = if previous.trim().is_empty() {
        "\n请描述你想要的工具或自动化需求：\n> ".to_string()
    } else {
        format!("\n请描述你的需求（回车沿用「{previous}」）：\n> ")
    };

    let request = match console.ask(&prompt)? {
        Reply::Quit => return Ok(Flow::Quit),
        Reply::Restart => {
            runtime.restart(session);
            return Ok(Flow::Continue);
        }
        Reply::Line(line) if line.trim().is_empty() && !previous.trim().is_empty() => previous,
        Reply::Line(line) => line,
    };

    console.say("正在分析需求…")?;
    if let Err(error) = runtime.begin_interview(session, &request).await {
        console.say(error.user_message())?;
        session.dismiss_error();
    }
    Ok(Flow::Continue)
}

async fn collect_answers<R: BufRead, W: Write>(
    runtime: &InterviewRuntime,
    session: &mut InterviewSession,
    console: &mut Console<R, W>,
) -> Result<Flow> {
    let questions = session.questions().to_vec();
    for (index, question) in questions.iter().enumerate() {
        show_question(console, index, question)?;
        loop {
            match ask_answer(runtime, session, console, question)? {
                Some(Flow::Continue) => break,
                Some(Flow::Quit) => return Ok(Flow::Quit),
                None if session.phase() != SessionPhase::Questions => return Ok(Flow::Continue),
                None => {}
            }
        }
    }

    console.say("\n正在计算报价…")?;
    if let Err(error) = runtime.generate_quote(session).await {
        console.say(error.user_message())?;
        session.dismiss_error();
    }
    Ok(Flow::Continue)
}

fn show_question<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    index: usize,
    question: &Question,
) -> io::Result<()> {
    console.say(format!("\n{}. {}", index + 1, question.text))?;
    for (number, option) in question.options.iter().enumerate() {
        console.say(format!("  {}) {option}", number + 1))?;
    }
    console.say(format!("  {}) {CUSTOM_OPTION_LABEL}", question.options.len() + 1))
}

/// One attempt at answering `question`. `Some(Continue)` means answered,
/// `None` means ask again or the session moved elsewhere.
fn ask_answer<R: BufRead, W: Write>(
    runtime: &InterviewRuntime,
    session: &mut InterviewSession,
    console: &mut Console<R, W>,
    question: &Question,
) -> io::Result<Option<Flow>> {
    let current =
        session.answers().get(question.id).and_then(AnswerState::resolved).map(str::to_string);
    let prompt = match &current {
        Some(answer) => format!("请选择（回车保留「{answer}」）："),
        None => "请选择：".to_string(),
    };

    let choice = match console.ask(&prompt)? {
        Reply::Quit => return Ok(Some(Flow::Quit)),
        Reply::Restart => {
            runtime.restart(session);
            return Ok(None);
        }
        Reply::Line(line) => line,
    };
    let choice = choice.trim();
    if choice.is_empty() && current.is_some() {
        return Ok(Some(Flow::Continue));
    }

    let custom_number = question.options.len() + 1;
    match choice.parse::<usize>() {
        Ok(number) if (1..custom_number).contains(&number) => {
            match session.select_option(question.id, &question.options[number - 1]) {
                Ok(()) => Ok(Some(Flow::Continue)),
                Err(error) => console.say(error.user_message()).map(|()| None),
            }
        }
        Ok(number) if number == custom_number => {
            if let Err(error) = session.enable_custom_input(question.id) {
                console.say(error.user_message())?;
                return Ok(None);
            }
            let text = match console.ask("请输入你的答案：")? {
                Reply::Quit => return Ok(Some(Flow::Quit)),
                Reply::Restart => {
                    runtime.restart(session);
                    return Ok(None);
                }
                Reply::Line(text) => text,
            };
            if let Err(error) = session.set_custom_text(question.id, text) {
                console.say(error.user_message())?;
                return Ok(None);
            }
            if session.answers().get(question.id).and_then(AnswerState::resolved).is_some() {
                Ok(Some(Flow::Continue))
            } else {
                console.say("答案不能为空。").map(|()| None)
            }
        }
        _ => console.say(format!("请输入 1 到 {custom_number} 之间的编号。")).map(|()| None),
    }
}

fn review_quote<R: BufRead, W: Write>(
    runtime: &InterviewRuntime,
    session: &mut InterviewSession,
    console: &mut Console<R, W>,
) -> Result<Flow> {
    if let Some(quote) = session.quote() {
        let rendered = quote.render_text();
        console.say(format!("\n报价方案：\n{}", rendered.trim_end()))?;
    }

    loop {
        let reply = console.ask("\n1) 修改答案重新报价  2) 重新开始  3) 退出\n请选择：")?;
        match reply {
            Reply::Quit => return Ok(Flow::Quit),
            Reply::Restart => {
                runtime.restart(session);
                return Ok(Flow::Continue);
            }
            Reply::Line(line) => match line.trim() {
                "1" => {
                    session.back_to_questions()?;
                    return Ok(Flow::Continue);
                }
                "2" => {
                    runtime.restart(session);
                    return Ok(Flow::Continue);
                }
                "3" => return Ok(Flow::Quit),
                _ => console.say("请输入 1、2 或 3。")?,
            },
        }
    }
}
