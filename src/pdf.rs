//! PDF assembly: order-preserving merge and page-number overlay.
//!
//! Both operations work on files on disk and are synchronous; the pipeline
//! runs them once, after all rendering has finished.
//!
//! - [`merge_pdfs`] concatenates documents exactly in the order given. The
//!   caller is responsible for putting the table of contents first.
//! - [`add_page_numbers`] composites a minimal one-stream overlay onto every
//!   page: Helvetica 10pt, drawn at (540, 25), bottom-right on US-letter
//!   geometry. Original page content is untouched.

use crate::error::EbookError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Resource name the overlay font is registered under on each page.
/// Prefixed to avoid colliding with fonts the renderer already emitted.
const NUMBER_FONT_NAME: &[u8] = b"CbPgNum";

/// Font size of the overlaid page number.
const NUMBER_FONT_SIZE: i64 = 10;

/// Position of the page number, in PDF user-space points.
const NUMBER_POS: (i64, i64) = (540, 25);

/// Concatenate `inputs` into a single document at `output`, preserving the
/// page order of each input and the order of the inputs themselves.
///
/// # Errors
///
/// [`EbookError::Merge`] when any input fails to load or the merged document
/// cannot be written.
#[instrument(level = "info", skip_all, fields(inputs = inputs.len(), output = %output.display()))]
pub fn merge_pdfs<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<(), EbookError> {
    let mut loaded = Vec::with_capacity(inputs.len());
    let mut max_id = 1;
    for input in inputs {
        let mut doc = Document::load(input.as_ref()).map_err(EbookError::Merge)?;
        // Shift object ids so documents cannot collide in the merged space.
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        loaded.push(doc);
    }

    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = Vec::new();
    for doc in &loaded {
        page_ids.extend(doc.get_pages().into_values());
    }
    for doc in loaded {
        for (id, object) in doc.objects {
            // Each input's catalog and page-tree nodes are replaced by the
            // merged document's own.
            if is_structural_node(&object) {
                continue;
            }
            merged.objects.insert(id, object);
        }
    }

    let pages_id = merged.new_object_id();
    for page_id in &page_ids {
        let page = merged
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(EbookError::Merge)?;
        page.set("Parent", Object::Reference(pages_id));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_ids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = merged.objects.keys().map(|id| id.0).max().unwrap_or(0);
    merged.renumber_objects();
    merged.compress();
    merged
        .save(output)
        .map_err(|e| EbookError::Merge(lopdf::Error::from(e)))?;

    info!(pages = page_ids.len(), "Merged documents");
    Ok(())
}

/// Copy `input` to `output` with a sequential page number overlaid on every
/// page, starting at 1 in page order.
///
/// Page count and existing content are preserved; the overlay adds one extra
/// content stream and one font resource per page.
///
/// # Errors
///
/// [`EbookError::Pagination`] when the merged document is malformed or the
/// result cannot be written.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn add_page_numbers(input: &Path, output: &Path) -> Result<(), EbookError> {
    let mut doc = Document::load(input).map_err(EbookError::Pagination)?;

    // One shared font object; each page references it by name.
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    for (number, page_id) in &pages {
        let overlay = number_overlay(*number).map_err(EbookError::Pagination)?;
        let stream_id = doc.add_object(Stream::new(dictionary! {}, overlay));
        register_number_font(&mut doc, *page_id, font_id).map_err(EbookError::Pagination)?;
        append_page_content(&mut doc, *page_id, stream_id).map_err(EbookError::Pagination)?;
        debug!(page = number, "Overlaid page number");
    }

    doc.save(output)
        .map_err(|e| EbookError::Pagination(lopdf::Error::from(e)))?;
    info!(pages = pages.len(), "Overlaid sequential page numbers");
    Ok(())
}

/// Encoded content stream that draws only the page number.
///
/// Wrapped in `q`/`Q` so the overlay cannot leak graphics state into
/// anything that might follow it.
fn number_overlay(number: u32) -> lopdf::Result<Vec<u8>> {
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(NUMBER_FONT_NAME.to_vec()),
                    NUMBER_FONT_SIZE.into(),
                ],
            ),
            Operation::new("Td", vec![NUMBER_POS.0.into(), NUMBER_POS.1.into()]),
            Operation::new("Tj", vec![Object::string_literal(number.to_string())]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    content.encode()
}

/// True for catalog and page-tree nodes, which the merge rebuilds itself.
fn is_structural_node(object: &Object) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .is_some_and(|name| name == b"Catalog" || name == b"Pages")
}

/// Locate the page's resource dictionary, creating an inline one when the
/// page has none. Follows an indirect `Resources` reference if present.
fn resources_dict_mut(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<&mut Dictionary> {
    let indirect = {
        let page = doc.get_object(page_id)?.as_dict()?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    match indirect {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut(),
        None => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            if !page.has(b"Resources") {
                page.set("Resources", Dictionary::new());
            }
            page.get_mut(b"Resources")?.as_dict_mut()
        }
    }
}

/// Make the overlay font reachable from the page's `Resources`/`Font` entry.
/// The `Font` sub-dictionary may itself be indirect.
fn register_number_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> lopdf::Result<()> {
    let indirect_fonts = {
        let resources = resources_dict_mut(doc, page_id)?;
        match resources.get(b"Font") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    let fonts = match indirect_fonts {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => {
            let resources = resources_dict_mut(doc, page_id)?;
            if !resources.has(b"Font") {
                resources.set("Font", Dictionary::new());
            }
            resources.get_mut(b"Font")?.as_dict_mut()?
        }
    };
    fonts.set(NUMBER_FONT_NAME.to_vec(), Object::Reference(font_id));
    Ok(())
}

/// Append the overlay stream after the page's existing content so it is
/// painted on top.
///
/// `Contents` may be a direct stream reference, a direct array, or an
/// indirect reference to an array object; an indirect array is extended in
/// place, since an array nested inside another array is not a valid page
/// `Contents`.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    stream_id: ObjectId,
) -> lopdf::Result<()> {
    let overlay_ref = Object::Reference(stream_id);

    let indirect = {
        let page = doc.get_object(page_id)?.as_dict()?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    if let Some(id) = indirect {
        if let Ok(streams) = doc.get_object_mut(id)?.as_array_mut() {
            streams.push(overlay_ref);
            return Ok(());
        }
        // The reference points at a single stream; pair it with the overlay
        // in a direct array on the page.
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Contents", vec![Object::Reference(id), overlay_ref]);
        return Ok(());
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    match page.get_mut(b"Contents") {
        Ok(Object::Array(streams)) => streams.push(overlay_ref),
        _ => page.set("Contents", overlay_ref),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Build a minimal document with one page per marker, each page's
    /// content drawing its marker.
    fn pdf_with_pages(markers: &[&str]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });
        let mut kids = Vec::with_capacity(markers.len());
        for marker in markers {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*marker)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => markers.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    fn write_pdf(dir: &TempDir, name: &str, markers: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        pdf_with_pages(markers).save(&path).unwrap();
        path
    }

    /// All string literals drawn by `Tj` on a page, in stream order.
    fn page_literals(doc: &Document, page_id: ObjectId) -> Vec<String> {
        let content = doc.get_and_decode_page_content(page_id).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_merge_preserves_order() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            write_pdf(&dir, "a.pdf", &["alpha"]),
            write_pdf(&dir, "b.pdf", &["bravo"]),
            write_pdf(&dir, "c.pdf", &["charlie"]),
        ];
        let output = dir.path().join("merged.pdf");

        merge_pdfs(&inputs, &output).unwrap();

        let merged = Document::load(&output).unwrap();
        let pages: Vec<ObjectId> = merged.get_pages().into_values().collect();
        assert_eq!(pages.len(), 3);
        assert_eq!(page_literals(&merged, pages[0]), vec!["alpha"]);
        assert_eq!(page_literals(&merged, pages[1]), vec!["bravo"]);
        assert_eq!(page_literals(&merged, pages[2]), vec!["charlie"]);
    }

    #[test]
    fn test_merge_multipage_inputs_keep_page_order_and_numbering() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            write_pdf(&dir, "a.pdf", &["a1", "a2", "a3"]),
            write_pdf(&dir, "b.pdf", &["b1"]),
            write_pdf(&dir, "c.pdf", &["c1", "c2"]),
        ];
        let merged_path = dir.path().join("merged.pdf");
        merge_pdfs(&inputs, &merged_path).unwrap();

        // Pages within each input stay contiguous and ordered.
        let merged = Document::load(&merged_path).unwrap();
        let pages: Vec<ObjectId> = merged.get_pages().into_values().collect();
        let markers: Vec<String> = pages
            .iter()
            .flat_map(|id| page_literals(&merged, *id))
            .collect();
        assert_eq!(markers, vec!["a1", "a2", "a3", "b1", "c1", "c2"]);

        let final_path = dir.path().join("final.pdf");
        add_page_numbers(&merged_path, &final_path).unwrap();

        let numbered = Document::load(&final_path).unwrap();
        let pages: Vec<ObjectId> = numbered.get_pages().into_values().collect();
        assert_eq!(pages.len(), 6);
        for (i, page_id) in pages.iter().enumerate() {
            let literals = page_literals(&numbered, *page_id);
            assert_eq!(literals.last().unwrap(), &(i + 1).to_string());
        }
    }

    #[test]
    fn test_merge_single_input() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![write_pdf(&dir, "only.pdf", &["solo"])];
        let output = dir.path().join("merged.pdf");

        merge_pdfs(&inputs, &output).unwrap();

        let merged = Document::load(&output).unwrap();
        assert_eq!(merged.get_pages().len(), 1);
    }

    #[test]
    fn test_merge_missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![dir.path().join("does_not_exist.pdf")];
        let output = dir.path().join("merged.pdf");

        let err = merge_pdfs(&inputs, &output).unwrap_err();
        assert!(matches!(err, EbookError::Merge(_)));
    }

    #[test]
    fn test_page_numbers_are_sequential_and_content_preserving() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            write_pdf(&dir, "a.pdf", &["alpha"]),
            write_pdf(&dir, "b.pdf", &["bravo"]),
        ];
        let merged_path = dir.path().join("merged.pdf");
        merge_pdfs(&inputs, &merged_path).unwrap();

        let final_path = dir.path().join("final.pdf");
        add_page_numbers(&merged_path, &final_path).unwrap();

        let numbered = Document::load(&final_path).unwrap();
        let pages: Vec<ObjectId> = numbered.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);

        // Original content first, numeral painted on top.
        assert_eq!(page_literals(&numbered, pages[0]), vec!["alpha", "1"]);
        assert_eq!(page_literals(&numbered, pages[1]), vec!["bravo", "2"]);
    }

    #[test]
    fn test_page_number_position_and_font() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "a.pdf", &["alpha"]);
        let final_path = dir.path().join("final.pdf");
        add_page_numbers(&input, &final_path).unwrap();

        let numbered = Document::load(&final_path).unwrap();
        let page_id = *numbered.get_pages().values().next().unwrap();
        let content = numbered.get_and_decode_page_content(page_id).unwrap();

        let td = content
            .operations
            .iter()
            .filter(|op| op.operator == "Td")
            .next_back()
            .expect("overlay Td");
        assert_eq!(td.operands[0].as_i64().unwrap(), 540);
        assert_eq!(td.operands[1].as_i64().unwrap(), 25);

        let tf = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tf")
            .next_back()
            .expect("overlay Tf");
        assert_eq!(tf.operands[0].as_name().unwrap(), NUMBER_FONT_NAME);
        assert_eq!(tf.operands[1].as_i64().unwrap(), 10);
    }

    #[test]
    fn test_page_numbers_register_font_resource() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(&dir, "a.pdf", &["alpha"]);
        let final_path = dir.path().join("final.pdf");
        add_page_numbers(&input, &final_path).unwrap();

        let numbered = Document::load(&final_path).unwrap();
        let page_id = *numbered.get_pages().values().next().unwrap();
        let page = numbered.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = match page.get(b"Resources").unwrap() {
            Object::Reference(id) => numbered.get_object(*id).unwrap().as_dict().unwrap(),
            Object::Dictionary(dict) => dict,
            other => panic!("unexpected Resources object: {other:?}"),
        };
        let fonts = match resources.get(b"Font").unwrap() {
            Object::Reference(id) => numbered.get_object(*id).unwrap().as_dict().unwrap(),
            Object::Dictionary(dict) => dict,
            other => panic!("unexpected Font object: {other:?}"),
        };
        assert!(fonts.has(NUMBER_FONT_NAME));
    }

    #[test]
    fn test_page_numbers_extend_indirect_contents_array_in_place() {
        // `Contents` may be an indirect reference to an array object; the
        // overlay must land inside that array, not wrap the reference in a
        // second one.
        let dir = TempDir::new().unwrap();
        let mut doc = pdf_with_pages(&["alpha"]);
        let page_id = *doc.get_pages().values().next().unwrap();
        let stream_ref = doc
            .get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .clone();
        let array_id = doc.add_object(vec![stream_ref]);
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Contents", Object::Reference(array_id));
        let input = dir.path().join("indirect.pdf");
        doc.save(&input).unwrap();

        let output = dir.path().join("final.pdf");
        add_page_numbers(&input, &output).unwrap();

        let numbered = Document::load(&output).unwrap();
        let page_id = *numbered.get_pages().values().next().unwrap();
        let contents = numbered
            .get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Contents")
            .unwrap();
        let Object::Reference(id) = contents else {
            panic!("expected indirect Contents, got {contents:?}");
        };
        let streams = numbered.get_object(*id).unwrap().as_array().unwrap();
        assert_eq!(streams.len(), 2);
        assert!(
            streams
                .iter()
                .all(|entry| matches!(entry, Object::Reference(_)))
        );

        // The appended stream is the numeral overlay.
        let overlay_id = streams[1].as_reference().unwrap();
        let overlay = numbered.get_object(overlay_id).unwrap().as_stream().unwrap();
        let content = Content::decode(&overlay.content).unwrap();
        let drawn: Vec<String> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(drawn, vec!["1"]);
    }
}
