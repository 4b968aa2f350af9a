//! OpenAPI documentation for the HTTP API.
//!
//! Served as JSON at `/api-docs/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::errors::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::status::server_status,
        api::handlers::documents::parse_document,
    ),
    components(
        schemas(
            api::models::status::StatusResponse,
            api::models::documents::ParseDocumentResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "status", description = "Liveness of the service."),
        (name = "documents", description = "Upload PDF or Word documents and extract their plain text.

Accepted media types:
- `application/pdf`
- `application/msword`
- `application/vnd.openxmlformats-officedocument.wordprocessingml.document`

The full text is written to the output directory as `<name>-extracted.txt`. The response carries the artifact path and a short preview."),
    ),
    info(
        title = "Document Parser API",
        version = "0.1.0",
        description = "Extract plain text from uploaded PDF and Word documents.

## Errors

Every failure returns a JSON body with a single `error` field:

```json
{
  \"error\": \"Invalid file type. Only PDF and Word documents are allowed.\"
}
```

Validation problems (missing, empty, oversized or wrong-type uploads) are `400`. Extraction and storage failures are `500`.",
    )
)]
pub struct ApiDoc;
