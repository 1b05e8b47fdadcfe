//! Extraction prompts sent to the remote model.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: adding a field to the extraction schema
//!    means editing exactly one constant.
//!
//! 2. **Testability**: unit tests can inspect the prompts directly without
//!    calling a real model, so prompt regressions are easy to catch.
//!
//! A caller-supplied custom prompt bypasses the selector entirely; see
//! [`resolve_prompt`].

use crate::formats::FileCategory;
use std::path::Path;

/// Prompt for `.pdf`, `.doc` and `.docx` inputs.
pub const DOCUMENT_PROMPT: &str = r#"You are an intelligent information extractor. Carefully extract all relevant details from the given document and return ONLY a clean JSON object. Do not include any markdown formatting, code blocks, or explanatory text.

Important:
- Return ONLY raw JSON, without ```json``` code blocks or any other surrounding formatting
- ONLY include fields that are explicitly mentioned or can be confidently extracted from the document
- Do NOT include a field if the information is missing, unavailable, or unclear
- Never invent or guess values

Extract the following and return them as a JSON object:

1. Personal Information:
   - First Name
   - Last Name
   - Gender
   - Nationality
   - Current Country of Residence
   - Date of Birth
   - Passport Number
   - Passport Expiry Date
   - Email Address (personal email only; ignore lecturer or institute addresses)
   - Phone Number

2. Address Details (do not use a test center as the address):
   - Country (may be inferred from the city)
   - Province / State
   - City (may be inferred from an examination board)
   - Postal / Zip Code
   - Home Address

3. Emergency Contact:
   - Name
   - Email Address
   - Relation with Applicant
   - Phone Number
   - Country
   - Province / State
   - City
   - Postal / Zip Code
   - Home Address

4. Academic History (may contain multiple records):
   - Obtained Degree (if applicable)
   - Roll Number
   - Total Marks
   - Obtained Marks
   - Country of Education
   - Level of Education (e.g. Secondary (SSC / O Levels / Level 2 Diploma), HSSC / A Levels / Level 3 Diploma, Diploma Qualification (HNC / Level 4, HND / Level 5), Undergraduate, Postgraduate)
   - Diploma Qualification (if applicable)
   - Grading Scheme (e.g. CGPA, Grade, Percentage)
   - Grade Average
   - Institute Name
   - Program Start Date
   - Program End Date
   - Program Duration

5. English Proficiency Test:
   - Exam Type (e.g. IELTS, LanguageCert, PTE, Duolingo, TOEFL)
   - Date of Exam
   - Overall Score
   - Sectional Scores (Listening, Reading, Writing, Speaking)
   - Valid Until
   - Issue Date

Return ONLY the JSON object with the extracted data. No explanations, no code blocks, just clean JSON."#;

/// Prompt for raster image inputs (scans, photos of ID cards, certificates).
pub const IMAGE_PROMPT: &str = r#"You are an intelligent image analyzer and OCR specialist. Analyze the given image and extract all relevant text and information. Return ONLY a clean JSON object without any markdown formatting or code blocks.

Important:
- Return ONLY raw JSON, without ```json``` code blocks or any other surrounding formatting
- ONLY include fields that are clearly visible and readable in the image
- Do NOT include a field if the information is missing, unclear, or not visible
- Never invent or guess values

Extract any of the following that are visible and return them as a JSON object:

1. Document Type: (e.g. ID Card, Passport, Driver's License, Certificate, Form)

2. Personal Information:
   - First Name
   - Last Name
   - Gender
   - Nationality
   - Current Country of Residence
   - Date of Birth
   - Passport Number
   - Passport Expiry Date
   - Email Address (personal email only; ignore lecturer or institute addresses)
   - Phone Number

3. Address Details (do not use a test center or an educational address):
   - Country (may be inferred from the city)
   - Province / State
   - City (may be inferred from an examination board)
   - Postal / Zip Code
   - Home Address

4. Emergency Contact:
   - Name
   - Email Address
   - Relation with Applicant
   - Phone Number
   - Country
   - Province / State
   - City
   - Postal / Zip Code
   - Home Address

5. Academic History (may contain multiple records):
   - Obtained Degree (if applicable)
   - Roll Number
   - Total Marks
   - Obtained Marks
   - Country of Education
   - Level of Education (e.g. Secondary (SSC / O Levels / Level 2 Diploma), HSSC / A Levels / Level 3 Diploma, Diploma Qualification (HNC / Level 4, HND / Level 5), Undergraduate, Postgraduate)
   - Diploma Qualification (if applicable)
   - Grading Scheme (e.g. CGPA, Grade, Percentage)
   - Grade Average
   - Institute Name
   - Program Start Date
   - Program End Date
   - Program Duration

6. English Proficiency Test:
   - Exam Type (e.g. IELTS, LanguageCert, PTE, Duolingo, TOEFL)
   - Date of Exam
   - Overall Score
   - Sectional Scores (Listening, Reading, Writing, Speaking)
   - Valid Until
   - Issue Date

7. Additional Information:
   - Any other relevant text or data visible in the image
   - Dates, numbers, or codes
   - Signatures or stamps (describe if present)

Return ONLY the JSON object with the extracted data. No explanations, no code blocks, just clean JSON."#;

/// Prompt for any other file type.
pub const GENERIC_PROMPT: &str = r#"Analyze this file and extract all relevant information. Return the results as a clean JSON object without any markdown formatting or code blocks. If it is a document, extract the key details. If it is an image, describe what you see and extract any visible text or data.

Return ONLY valid JSON, without ```json``` code blocks or extra formatting."#;

/// Select the built-in prompt for a file, by extension.
pub fn prompt_for(path: impl AsRef<Path>) -> &'static str {
    match FileCategory::of(path) {
        FileCategory::Document => DOCUMENT_PROMPT,
        FileCategory::Image => IMAGE_PROMPT,
        FileCategory::Other => GENERIC_PROMPT,
    }
}

/// The prompt actually sent: a non-blank custom prompt wins outright,
/// otherwise [`prompt_for`] decides.
pub fn resolve_prompt<'a>(path: impl AsRef<Path>, custom: Option<&'a str>) -> &'a str {
    match custom.map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => prompt_for(path),
    }
}
