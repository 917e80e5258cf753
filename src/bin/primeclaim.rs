//! Command-line front end for the prime claim pipeline.
//!
//! Builds roots and proofs over the prime domain, answers challenges with a
//! key file, verifies signatures and claim artifacts, and runs the
//! proof-of-work nonce search.

use std::env;
use std::path::PathBuf;

use log::error;
use prime_claim::commands::claim::{run_build_claim, run_verify_claim, BuildClaimOptions};
use prime_claim::commands::proof::{run_prove, run_verify_proof};
use prime_claim::hash::digest_to_hex;
use prime_claim::{
    mine_block_parallel, verify_challenge_hex, Challenge, ClaimConfig, DomainTree, MessageSigner,
    SigningIdentity,
};
use rand::rngs::OsRng;

const DEFAULT_MAX_NONCE: u64 = u64::MAX;

fn fatal(message: &str) -> ! {
    error!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: primeclaim [--config <file>] <command> ...");
    println!("  root [--count <N>]");
    println!("  prove --index <I> [--count <N>] [--output <file>]");
    println!("  verify --proof <proof.json> [--root <hex> | --count <N>]");
    println!("  claim --output <file> [--index <I>] [--count <N>]");
    println!("        [--key-file <file>] [--challenge <text>]");
    println!("  verify-claim --file <claim.json>");
    println!("  challenge");
    println!("  sign --challenge <text> [--key-file <file>]");
    println!("  verify-sig --challenge <text> --address <hex> --signature <hex>");
    println!("  mine --difficulty <K> --prev <hex> [--tx <line>]... [--max-nonce <N>]");
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config_path: Option<PathBuf> = None;
    if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            fatal("--config expects a value");
        }
        config_path = Some(PathBuf::from(args.remove(1)));
        args.remove(0);
    }
    let config = ClaimConfig::load(config_path.as_deref())
        .unwrap_or_else(|err| fatal(&format!("config error: {err}")));

    let mut args = args.into_iter();
    let command = args.next();
    let tail: Vec<String> = args.collect();
    match command.as_deref() {
        Some("root") => cmd_root(&config, tail),
        Some("prove") => cmd_prove(&config, tail),
        Some("verify") => cmd_verify(&config, tail),
        Some("claim") => cmd_claim(&config, tail),
        Some("verify-claim") => cmd_verify_claim(tail),
        Some("challenge") => cmd_challenge(&config),
        Some("sign") => cmd_sign(&config, tail),
        Some("verify-sig") => cmd_verify_sig(tail),
        Some("mine") => cmd_mine(tail),
        Some("-h") | Some("--help") | None => print_help(),
        Some(other) => {
            print_help();
            fatal(&format!("unknown command: {other}"));
        }
    }
}

fn next_value(iter: &mut impl Iterator<Item = String>, flag: &str) -> String {
    iter.next()
        .unwrap_or_else(|| fatal(&format!("{flag} expects a value")))
}

fn parse_usize(raw: &str, flag: &str) -> usize {
    raw.parse::<usize>()
        .unwrap_or_else(|_| fatal(&format!("invalid {flag}")))
}

fn build_tree(count: usize) -> DomainTree {
    DomainTree::build(count).unwrap_or_else(|err| fatal(&format!("tree build failed: {err}")))
}

fn cmd_root(config: &ClaimConfig, args: Vec<String>) {
    let mut count = config.prime_count;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--count" => count = parse_usize(&next_value(&mut iter, "--count"), "--count"),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let tree = build_tree(count);
    println!("primes: {count}");
    println!("levels: {}", tree.tree.depth() + 1);
    println!("root: {}", digest_to_hex(&tree.root()));
}

fn cmd_prove(config: &ClaimConfig, args: Vec<String>) {
    let mut count = config.prime_count;
    let mut index: Option<usize> = None;
    let mut output: Option<PathBuf> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--count" => count = parse_usize(&next_value(&mut iter, "--count"), "--count"),
            "--index" => index = Some(parse_usize(&next_value(&mut iter, "--index"), "--index")),
            "--output" => output = Some(PathBuf::from(next_value(&mut iter, "--output"))),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let index = index.unwrap_or_else(|| fatal("--index is required"));
    let json = run_prove(count, index, output.as_deref())
        .unwrap_or_else(|err| fatal(&format!("proof failed: {err}")));
    if output.is_none() {
        println!("{json}");
    }
}

fn cmd_verify(config: &ClaimConfig, args: Vec<String>) {
    let mut proof_path: Option<PathBuf> = None;
    let mut root: Option<String> = None;
    let mut count = config.prime_count;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--proof" => proof_path = Some(PathBuf::from(next_value(&mut iter, "--proof"))),
            "--root" => root = Some(next_value(&mut iter, "--root")),
            "--count" => count = parse_usize(&next_value(&mut iter, "--count"), "--count"),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let proof_path = proof_path.unwrap_or_else(|| fatal("--proof is required"));
    match run_verify_proof(&proof_path, root.as_deref(), count) {
        Ok(true) => println!("proof valid"),
        Ok(false) => fatal("proof does not match root"),
        Err(err) => fatal(&format!("proof verification failed: {err}")),
    }
}

fn cmd_claim(config: &ClaimConfig, args: Vec<String>) {
    let mut opts = BuildClaimOptions {
        prime_count: config.prime_count,
        index: None,
        key_file: config.key_file.clone(),
        challenge: None,
        challenge_len: config.challenge_len,
        chain: config.chain,
        contract_address: config
            .contract()
            .unwrap_or_else(|err| fatal(&format!("contract info error: {err}")))
            .map(|info| info.address),
    };
    let mut output: Option<PathBuf> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--output" => output = Some(PathBuf::from(next_value(&mut iter, "--output"))),
            "--count" => {
                opts.prime_count = parse_usize(&next_value(&mut iter, "--count"), "--count")
            }
            "--index" => {
                opts.index = Some(parse_usize(&next_value(&mut iter, "--index"), "--index"))
            }
            "--key-file" => opts.key_file = PathBuf::from(next_value(&mut iter, "--key-file")),
            "--challenge" => opts.challenge = Some(next_value(&mut iter, "--challenge")),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let output = output.unwrap_or_else(|| fatal("--output is required"));
    let root = run_build_claim(&opts, &output)
        .unwrap_or_else(|err| fatal(&format!("claim build failed: {err}")));
    println!("claim root: {root}");
    println!("chain: {} ({})", config.chain, config.chain.rpc_url());
    println!("artifact: {}", output.display());
}

fn cmd_verify_claim(args: Vec<String>) {
    let mut file: Option<PathBuf> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--file" => file = Some(PathBuf::from(next_value(&mut iter, "--file"))),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let file = file.unwrap_or_else(|| fatal("--file is required"));
    match run_verify_claim(&file) {
        Ok(true) => println!("claim valid"),
        Ok(false) => fatal("claim does not verify"),
        Err(err) => fatal(&format!("claim verification failed: {err}")),
    }
}

fn cmd_challenge(config: &ClaimConfig) {
    let challenge = Challenge::random(&mut OsRng, config.challenge_len);
    println!("{}", challenge.as_str());
}

fn cmd_sign(config: &ClaimConfig, args: Vec<String>) {
    let mut challenge: Option<String> = None;
    let mut key_file = config.key_file.clone();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--challenge" => challenge = Some(next_value(&mut iter, "--challenge")),
            "--key-file" => key_file = PathBuf::from(next_value(&mut iter, "--key-file")),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let challenge = challenge.unwrap_or_else(|| fatal("--challenge is required"));
    let identity = SigningIdentity::from_file(&key_file)
        .unwrap_or_else(|err| fatal(&format!("key error: {err}")));
    let answer = identity
        .answer(&Challenge::from_issued(challenge))
        .unwrap_or_else(|err| fatal(&format!("cannot answer challenge: {err}")));
    println!("address: {}", answer.address);
    println!("signature: {}", answer.signature.to_hex());
}

fn cmd_verify_sig(args: Vec<String>) {
    let mut challenge: Option<String> = None;
    let mut address: Option<String> = None;
    let mut signature: Option<String> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--challenge" => challenge = Some(next_value(&mut iter, "--challenge")),
            "--address" => address = Some(next_value(&mut iter, "--address")),
            "--signature" => signature = Some(next_value(&mut iter, "--signature")),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let challenge = challenge.unwrap_or_else(|| fatal("--challenge is required"));
    let address = address.unwrap_or_else(|| fatal("--address is required"));
    let signature = signature.unwrap_or_else(|| fatal("--signature is required"));
    if verify_challenge_hex(&challenge, &address, &signature) {
        println!("signature valid for {address}");
    } else {
        fatal("signature does not verify");
    }
}

fn cmd_mine(args: Vec<String>) {
    let mut difficulty: Option<u32> = None;
    let mut prev: Option<String> = None;
    let mut transactions = Vec::new();
    let mut max_nonce = DEFAULT_MAX_NONCE;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--difficulty" => {
                let raw = next_value(&mut iter, "--difficulty");
                difficulty = Some(
                    raw.parse::<u32>()
                        .unwrap_or_else(|_| fatal("invalid --difficulty")),
                );
            }
            "--prev" => prev = Some(next_value(&mut iter, "--prev")),
            "--tx" => transactions.push(next_value(&mut iter, "--tx")),
            "--max-nonce" => {
                let raw = next_value(&mut iter, "--max-nonce");
                max_nonce = raw
                    .parse::<u64>()
                    .unwrap_or_else(|_| fatal("invalid --max-nonce"));
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let difficulty = difficulty.unwrap_or_else(|| fatal("--difficulty is required"));
    let prev = prev.unwrap_or_else(|| fatal("--prev is required"));
    let prev_bytes = hex::decode(prev.trim_start_matches("0x"))
        .unwrap_or_else(|err| fatal(&format!("invalid --prev hex: {err}")));
    let nonce = mine_block_parallel(difficulty, &prev_bytes, &transactions, max_nonce)
        .unwrap_or_else(|err| fatal(&format!("mining failed: {err}")));
    println!("nonce: {}", String::from_utf8_lossy(&nonce));
}
