use mnx_dom::common::{NoteValueFields, TimeSignature};
use mnx_dom::enums::{NoteStep, NoteValueBase, TimeSignatureUnit};
use mnx_dom::{Document, MnxError, ValidationOptions, View};

fn build() -> Result<Document, MnxError> {
    let doc = Document::new();
    let measure = doc.global()?.measures()?.append()?;
    TimeSignature::create(measure.node(), "time", 4, TimeSignatureUnit::Quarter)?;

    let part = doc.parts()?.append()?;
    part.set_id("P1")?;
    part.set_name("Flute")?;
    let content = part.ensure_measures()?.append()?.create_sequences()?.append()?.create_content()?;
    for step in [NoteStep::C, NoteStep::D, NoteStep::E] {
        let event = content.append_event(Some(NoteValueFields::new(NoteValueBase::Quarter, 0)))?;
        event.append_note(step, 5, None)?;
    }
    Ok(doc)
}

fn main() {
    let doc = match build() {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Failed to build document: {e}");
            return;
        }
    };

    // Three quarters in a 4/4 measure: one shortfall.
    let result = doc.validate(&ValidationOptions::default());
    if result.is_valid() {
        println!("Document is valid");
    } else {
        println!("Validation findings:\n{}", *result);
    }

    match doc.to_json_string(Some(2)) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize: {e:?}"),
    }
}
