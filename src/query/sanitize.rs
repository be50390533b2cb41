use polars::prelude::*;

/// Replace NaN and ±inf in float columns with nulls. Other columns pass through.
pub fn sanitize_frame(df: DataFrame) -> PolarsResult<DataFrame> {
    let has_floats = df.get_columns().iter().any(|c| matches!(c.dtype(), DataType::Float32 | DataType::Float64));
    if !has_floats {
        return Ok(df);
    }
    let cols = df.get_columns().iter().map(sanitize_column).collect::<PolarsResult<Vec<Column>>>()?;
    DataFrame::new(cols)
}

fn sanitize_column(c: &Column) -> PolarsResult<Column> {
    match c.dtype() {
        DataType::Float64 => {
            let ca: Float64Chunked = c.f64()?.into_iter().map(|v| v.filter(|x| x.is_finite())).collect();
            Ok(ca.with_name(c.name().clone()).into_series().into())
        }
        DataType::Float32 => {
            let ca: Float32Chunked = c.f32()?.into_iter().map(|v| v.filter(|x| x.is_finite())).collect();
            Ok(ca.with_name(c.name().clone()).into_series().into())
        }
        _ => Ok(c.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_floats_become_null() {
        let df = DataFrame::new(vec![
            Series::new("name".into(), vec!["a", "b", "c", "d"]).into(),
            Series::new("score".into(), vec![Some(1.5), Some(f64::NAN), Some(f64::INFINITY), None]).into(),
            Series::new("ratio".into(), vec![f32::NEG_INFINITY, 0.25, 1.0, 2.0]).into(),
        ])
        .unwrap();
        let out = sanitize_frame(df).unwrap();
        let score: Vec<Option<f64>> = out.column("score").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(score, vec![Some(1.5), None, None, None]);
        let ratio: Vec<Option<f32>> = out.column("ratio").unwrap().f32().unwrap().into_iter().collect();
        assert_eq!(ratio, vec![None, Some(0.25), Some(1.0), Some(2.0)]);
        assert_eq!(out.column("name").unwrap().str().unwrap().get(1), Some("b"));
    }

    #[test]
    fn frames_without_floats_are_untouched() {
        let df = DataFrame::new(vec![Series::new("n".into(), vec![1i64, 2, 3]).into()]).unwrap();
        let out = sanitize_frame(df.clone()).unwrap();
        assert!(out.equals(&df));
    }
}
