use std::io::Write;

use log::info;

use rs_markov_core::{
    BacktrackLimit, Error, LearningMode, Markov, MarkovConfig, Session, TokenMode, TurnEvent,
};

const CONVERSATION: [&str; 8] = [
    "hello",
    "hello there how are you",
    "i am fine and you",
    "i am fine too",
    "what do you like",
    "i like talking with you",
    "what do you do",
    "i learn what you say",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Either learn a transcript file given on the command line (cached as
    // a .bin next to it), or the small built-in conversation
    let mut session = match std::env::args().nth(1) {
        Some(corpus) => {
            info!("Using corpus {}", corpus);
            Session::from_corpus(corpus, MarkovConfig::default())?
        }
        None => {
            info!("No corpus given, using the built-in conversation");
            let mut session = Session::new(Markov::default(), LearningMode::Conversational);
            let increments = session.learn_transcript(&CONVERSATION)?;
            println!("Learned {} lines ({} increments)", CONVERSATION.len(), increments);
            session
        }
    };

    // Each turn learns the prompt as an answer to the previous reply, then
    // replies. Steps are driven one by one to show progress and stream tokens.
    for prompt in ["hello", "what do you like", "how are you"] {
        println!("> {}", prompt);
        let mut turn = session.turn(prompt);
        let mut planned = 0;
        let mut tokens: Vec<String> = Vec::new();

        while let Some(event) = turn.step(())? {
            match event {
                TurnEvent::Planned(total) => planned = total,
                TurnEvent::Learned(done) if planned > 0 => {
                    print!("\rLearning... {}%", done * 100 / planned);
                    std::io::stdout().flush()?;
                }
                TurnEvent::Learned(_) => {}
                TurnEvent::Token(token) => tokens.push(token),
            }
        }
        if planned > 0 {
            println!();
        }
        let reply = turn.into_result().unwrap_or_default();
        println!("< {} ({} tokens)", reply, tokens.len());
    }

    // Look inside the model: where would a reply to this prompt start?
    let markov = session.markov();
    let path = markov.focus_path("what do you do");
    println!("Focus path: {:?}", path);
    if let Some(next) = markov.continuations(&path) {
        for (token, count) in next.iter() {
            println!("  {} -> {}", token, count);
        }
    }

    // A fresh model knows nothing and cannot reply
    let mut fresh = Markov::default();
    match fresh.respond("anyone there").collect::<Result<Vec<String>, Error>>() {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Fresh model: {}", e),
    }

    // Learning can be abandoned halfway; what was reported is kept
    fresh.configure(TokenMode::Letter, BacktrackLimit::Limited(3));
    let mut learning = fresh.learn("", "abcdef");
    let expected = learning.step(())?.unwrap_or(0);
    let mut done = 0;
    while let Some(progress) = learning.step(())? {
        done = progress;
        if done * 2 >= expected {
            break;
        }
    }
    drop(learning);
    info!("Learning cancelled at {}/{}", done, expected);
    println!(
        "Stopped after {} of {} increments, {} kept",
        done,
        expected,
        fresh.associations().total_mass()
    );

    Ok(())
}
