use std::path::Path;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::asm::Diagnostic;
use crate::image::LoadError;

// Assembler errors

pub fn assembly_failed(path: &Path, errors: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::failed",
        help = "no image was written; fix the errors above and try again",
        "Could not assemble `{}` due to {} error{}",
        path.display(),
        errors,
        if errors == 1 { "" } else { "s" },
    )
}

pub fn builtin_os(diagnostics: &[Diagnostic], src: &'static str) -> Report {
    let labels = diagnostics
        .iter()
        .filter(|diag| diag.is_error())
        .map(|diag| LabeledSpan::at(diag.span.range.clone(), diag.kind.to_string()))
        .collect::<Vec<_>>();
    miette!(
        severity = Severity::Error,
        code = "os::assemble",
        help = "set LC3SIM_OS=0 to run without a system image",
        labels = labels,
        "The built-in system image failed to assemble",
    )
    .with_source_code(src)
}

// Loader errors

pub fn load_image(path: &Path, error: &LoadError) -> Report {
    let help = match error {
        LoadError::Io(_) => "check that the file exists and is readable",
        LoadError::Empty | LoadError::Format { .. } => {
            "images hold one line of 16 `0`/`1` characters per word, starting with the origin"
        }
        LoadError::OutOfRange { .. } => "programs must fit below the device registers at xFE00",
    };
    miette!(
        severity = Severity::Error,
        code = "load::image",
        help = help,
        "Could not load `{}`: {}",
        path.display(),
        error,
    )
}

pub fn unknown_extension(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "cli::extension",
        help = "pass assembly source as `.asm`, or an assembled image as `.bin`",
        "File `{}` has an unknown extension",
        path.display(),
    )
}
