use anyhow::{Context, Result};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`.
    fn range(&mut self, low: i64, high: i64) -> i64 {
        low + (self.next_f64() * (high - low) as f64) as i64
    }

    /// Uniform float in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    fn choice<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.range(0, options.len() as i64) as usize]
    }

    /// Weighted choice; weights must sum to 1.
    fn weighted_choice<'a>(&mut self, options: &[(&'a str, f64)]) -> &'a str {
        let mut roll = self.next_f64();
        for &(option, weight) in options {
            if roll < weight {
                return option;
            }
            roll -= weight;
        }
        options[options.len() - 1].0
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let n_rows = 10_000;
    let output_path = "customer_churn_data.csv";

    let mut writer = csv::Writer::from_path(output_path)
        .with_context(|| format!("creating {output_path}"))?;
    writer.write_record([
        "CustomerID",
        "Age",
        "Gender",
        "Tenure_Months",
        "Contract_Type",
        "Payment_Method",
        "Monthly_Charges",
        "Total_Charges",
        "Num_Support_Calls",
        "Avg_Login_Per_Month",
        "Churn",
    ])?;

    for i in 0..n_rows {
        let customer_id = format!("CUST_{}", 1000 + i);
        let age = rng.range(18, 75);
        let gender = rng.choice(&["Male", "Female"]);

        let tenure_months = rng.range(1, 72);
        let contract_type = rng.weighted_choice(&[
            ("Month-to-month", 0.5),
            ("One year", 0.3),
            ("Two year", 0.2),
        ]);
        let payment_method = rng.choice(&[
            "Electronic check",
            "Mailed check",
            "Bank transfer",
            "Credit card",
        ]);
        let monthly_charges = (rng.uniform(30.0, 120.0) * 100.0).round() / 100.0;
        let total_charges = (monthly_charges * tenure_months as f64 * 100.0).round() / 100.0;

        let num_support_calls = rng.range(0, 6);
        let avg_login_per_month = rng.range(1, 30);

        let mut churn_prob = 0.40;
        if tenure_months > 48 {
            churn_prob -= 0.25;
        } else if tenure_months > 24 {
            churn_prob -= 0.15;
        } else if tenure_months < 6 {
            churn_prob += 0.10;
        }
        match contract_type {
            "Month-to-month" => churn_prob += 0.15,
            "Two year" => churn_prob -= 0.15,
            _ => {}
        }
        if num_support_calls > 3 {
            churn_prob += 0.25;
        }
        if num_support_calls == 0 {
            churn_prob -= 0.05;
        }
        if monthly_charges > 100.0 {
            churn_prob += 0.05;
        }
        churn_prob = (churn_prob + rng.gauss(0.0, 0.05)).clamp(0.0, 1.0);

        let churn = if rng.next_f64() < churn_prob { 1 } else { 0 };

        writer.write_record([
            customer_id,
            age.to_string(),
            gender.to_string(),
            tenure_months.to_string(),
            contract_type.to_string(),
            payment_method.to_string(),
            format!("{monthly_charges:.2}"),
            format!("{total_charges:.2}"),
            num_support_calls.to_string(),
            avg_login_per_month.to_string(),
            churn.to_string(),
        ])?;
    }

    writer.flush()?;
    println!("Wrote {n_rows} customers to {output_path}");
    Ok(())
}
