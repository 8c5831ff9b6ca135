//! Mnemonic entry on a numeric keypad, as a pure event fold.
//!
//! The UI feeds `EntryEvent`s into `EntryFlow::apply` and renders the
//! returned `EntryModel`; no state lives outside the model. Backspace is an
//! undo: each model keeps the one it was folded from.

use std::collections::BTreeSet;

use zeroize::Zeroizing;

use super::keypad::NumericTree;
use super::mnemonic::{self, MnemonicError};

/// Mnemonic entry stops offering keys once this many words are accepted.
const MAX_WORDS: usize = 24;

/// A user action on the entry keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEvent {
    /// A numeric key, 2 through 9.
    KeyPress(u8),
    /// Undo the last applied event.
    Backspace,
    /// Accept the suggested word at this index.
    AcceptWord(usize),
}

/// Entry state after a sequence of events.
#[derive(Debug, Clone)]
pub struct EntryModel {
    current_key: String,
    display: String,
    available: BTreeSet<u8>,
    mnemonic: Vec<&'static str>,
    exact_matches: Vec<&'static str>,
    previous: Option<Box<EntryModel>>,
    error: Option<MnemonicError>,
}

impl EntryModel {
    /// The digit sequence of the word being entered.
    pub fn current_key(&self) -> &str {
        &self.current_key
    }

    /// Masked preview of the word being entered: the letters the remaining
    /// candidates agree on, `*` where they differ.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The digits that still lead to a word.
    pub fn available(&self) -> &BTreeSet<u8> {
        &self.available
    }

    /// Whether a digit key still leads to a word.
    pub fn is_available(&self, digit: u8) -> bool {
        self.available.contains(&digit)
    }

    /// Words accepted so far.
    pub fn mnemonic(&self) -> &[&'static str] {
        &self.mnemonic
    }

    /// The suggestions offered for the current key.
    pub fn exact_matches(&self) -> &[&'static str] {
        &self.exact_matches
    }

    /// Whether backspace has anything to undo.
    pub fn is_backspace_available(&self) -> bool {
        self.previous.is_some()
    }

    /// Validation state of the accepted mnemonic. `None` means valid.
    pub fn error(&self) -> Option<MnemonicError> {
        self.error
    }

    /// The Base58 root xprv for the accepted mnemonic, once it is valid.
    pub fn root_xprv(&self) -> Option<Zeroizing<String>> {
        if self.error.is_some() {
            return None;
        }
        mnemonic::root_xprv(&self.mnemonic.join(" ")).ok()
    }
}

/// Folds keypad events over the wordlist tree.
pub struct EntryFlow {
    root: NumericTree,
}

impl EntryFlow {
    pub fn new() -> Self {
        Self {
            root: NumericTree::english(),
        }
    }

    /// The state before any input.
    pub fn initial(&self) -> EntryModel {
        EntryModel {
            current_key: String::new(),
            display: String::new(),
            available: available_in(&self.root),
            mnemonic: Vec::new(),
            exact_matches: Vec::new(),
            previous: None,
            error: Some(MnemonicError::Incomplete),
        }
    }

    /// Fold one event into the model.
    pub fn apply(&self, model: EntryModel, event: EntryEvent) -> EntryModel {
        match event {
            EntryEvent::KeyPress(digit) => self.on_key(model, digit),
            EntryEvent::Backspace => on_backspace(model),
            EntryEvent::AcceptWord(option) => self.on_accept(model, option),
        }
    }

    fn on_key(&self, model: EntryModel, digit: u8) -> EntryModel {
        if !model.available.contains(&digit) {
            return model;
        }
        let mut key = model.current_key.clone();
        key.push((b'0' + digit) as char);
        let Some(node) = self.root.find(&key) else {
            return model;
        };

        let display = node.common_pattern().replace('?', "*");
        let available = available_in(node);
        let exact_matches = node.top3().to_vec();
        let mnemonic = model.mnemonic.clone();
        EntryModel {
            current_key: key,
            display,
            available,
            mnemonic,
            exact_matches,
            previous: Some(Box::new(model)),
            error: Some(MnemonicError::Incomplete),
        }
    }

    fn on_accept(&self, model: EntryModel, option: usize) -> EntryModel {
        let Some(&word) = model.exact_matches.get(option) else {
            return model;
        };

        let mut mnemonic = model.mnemonic.clone();
        mnemonic.push(word);
        let error = mnemonic::validate(&mnemonic).err();
        let available = if mnemonic.len() == MAX_WORDS {
            BTreeSet::new()
        } else {
            available_in(&self.root)
        };
        EntryModel {
            current_key: String::new(),
            display: String::new(),
            available,
            mnemonic,
            exact_matches: Vec::new(),
            previous: Some(Box::new(model)),
            error,
        }
    }
}

impl Default for EntryFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn on_backspace(mut model: EntryModel) -> EntryModel {
    match model.previous.take() {
        Some(previous) => *previous,
        None => model,
    }
}

fn available_in(node: &NumericTree) -> BTreeSet<u8> {
    (2..=9u8)
        .filter(|digit| node.is_available((b'0' + digit) as char))
        .collect()
}
